use ndarray::array;
use tissue_survival::{
    kaplan_meier::ConfidenceTransform,
    log_rank_test,
    logrank::Group,
    KaplanMeier,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Kaplan-Meier curves and log-rank test");
    println!("=====================================\n");

    // months to event, stroma-high vs stroma-low
    let high_times = array![3.1, 5.9, 5.9, 8.2, 11.0, 13.4, 17.8, 22.5, 26.0, 31.2];
    let high_events = array![true, true, false, true, true, false, true, true, false, true];
    let low_times = array![6.4, 12.0, 15.5, 21.3, 27.9, 33.0, 38.1, 42.6, 49.0, 55.3];
    let low_events = array![true, false, true, false, true, false, false, true, false, false];

    for transform in [ConfidenceTransform::LogLog, ConfidenceTransform::Linear] {
        let km = KaplanMeier::new().with_transform(transform);
        let high = km.fit("high", high_times.view(), high_events.view())?;
        let low = km.fit("low", low_times.view(), low_events.view())?;

        println!("{transform:?} bounds:");
        for curve in [&high, &low] {
            println!("  {} ({} patients, {} events)", curve.label, curve.n_observations(), curve.n_events());
            println!("    {:>6}  {:>6}  {:>14}  {:>7}", "time", "S(t)", "95% CI", "at risk");
            for p in &curve.points {
                println!(
                    "    {:>6.1}  {:>6.3}  [{:.3}, {:.3}]  {:>7}",
                    p.time, p.survival, p.ci_lower, p.ci_upper, p.at_risk
                );
            }
            match curve.median_survival() {
                Some(m) => println!("    median survival: {m:.1} months"),
                None => println!("    median survival: not reached"),
            }
        }
        println!();
    }

    let result = log_rank_test(
        Group::new("high", high_times.view(), high_events.view()),
        Group::new("low", low_times.view(), low_events.view()),
    )?;
    println!("Log-rank test:");
    println!("  observed: {:?}", result.observed);
    println!("  expected: {:.3?}", result.expected);
    println!("  chi-square = {:.3} (df = {}), p = {:.4}", result.statistic, result.degrees_of_freedom, result.p_value);

    Ok(())
}

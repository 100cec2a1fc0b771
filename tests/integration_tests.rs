use std::collections::BTreeMap;
use std::path::Path;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tissue_survival::{
    cohort::{assemble_cohort, SlideMapping, SlideRecord},
    log_rank_test,
    logrank::Group,
    prepare, run_analysis, AnalysisConfig, CohortTable, CoxModel, KaplanMeier, PrepareConfig,
    SurvivalData, SurvivalError,
};
use ndarray::{Array1, Array2};

/// 100-patient null cohort: days uniform in [30, 3650], events Bernoulli(0.4), score uniform
fn null_cohort(rng: &mut StdRng, n: usize) -> CohortTable {
    let mut table = CohortTable::new(
        "PATIENT",
        vec!["DSS.time".into(), "DSS".into(), "score".into()],
    );
    for i in 0..n {
        let days = rng.gen_range(30.0..3650.0);
        let event = if rng.gen_bool(0.4) { 1.0 } else { 0.0 };
        let score = rng.r#gen::<f64>();
        table
            .push_row(format!("P{i:03}"), vec![Some(days), Some(event), Some(score)])
            .unwrap();
    }
    table
}

fn score_config() -> PrepareConfig {
    PrepareConfig::default()
        .with_score_columns(vec!["score".into()])
        .with_categorical_columns(vec![])
}

/// exponential event times with hazard 0.01 * exp(beta * high), uniform censoring
fn effect_cohort(rng: &mut StdRng, n: usize, beta: f64) -> CohortTable {
    let mut table = CohortTable::new(
        "PATIENT",
        vec!["DSS.time".into(), "DSS".into(), "score".into()],
    );
    for i in 0..n {
        let score = rng.r#gen::<f64>();
        let high = if score > 0.5 { 1.0 } else { 0.0 };
        let rate = 0.01 * (beta * high).exp();
        let event_time = -rng.r#gen::<f64>().ln() / rate;
        let censor_time = rng.gen_range(30.0..400.0);
        let (days, event) = if event_time < censor_time {
            (event_time, 1.0)
        } else {
            (censor_time, 0.0)
        };
        table
            .push_row(format!("P{i:03}"), vec![Some(days), Some(event), Some(score)])
            .unwrap();
    }
    table
}

#[test]
fn test_null_hazard_ratio_interval_covers_one() {
    let mut rng = StdRng::seed_from_u64(42);
    let trials = 200;
    let mut covered = 0;

    for _ in 0..trials {
        let cohort = null_cohort(&mut rng, 100);
        let table = prepare(&cohort, &score_config()).unwrap();
        let model = CoxModel::new().fit(table.data()).unwrap();
        let c = model.coefficient("score_binary").unwrap();

        assert!(c.hazard_ratio > 0.0);
        assert!(c.ci_lower <= c.hazard_ratio && c.hazard_ratio <= c.ci_upper);
        if c.ci_lower <= 1.0 && 1.0 <= c.ci_upper {
            covered += 1;
        }
    }

    let coverage = covered as f64 / trials as f64;
    assert!(
        (0.88..=0.99).contains(&coverage),
        "95% interval covered HR = 1 in {coverage} of null cohorts"
    );
}

#[test]
fn test_log_rank_p_values_uniform_under_null() {
    let mut rng = StdRng::seed_from_u64(7);
    let trials = 300;
    let mut p_values = Vec::with_capacity(trials);

    for _ in 0..trials {
        let mut draw = |n: usize| {
            let times: Array1<f64> = (0..n).map(|_| rng.gen_range(1.0..120.0)).collect();
            let events: Array1<bool> = (0..n).map(|_| rng.gen_bool(0.6)).collect();
            (times, events)
        };
        let (t1, e1) = draw(50);
        let (t2, e2) = draw(50);
        let result = log_rank_test(
            Group::new("a", t1.view(), e1.view()),
            Group::new("b", t2.view(), e2.view()),
        )
        .unwrap();

        assert!(result.statistic >= 0.0);
        assert!((0.0..=1.0).contains(&result.p_value));
        p_values.push(result.p_value);
    }

    let mean = p_values.iter().sum::<f64>() / trials as f64;
    let rejected = p_values.iter().filter(|&&p| p < 0.05).count() as f64 / trials as f64;
    let below_half = p_values.iter().filter(|&&p| p < 0.5).count() as f64 / trials as f64;

    assert!((0.42..=0.58).contains(&mean), "mean p-value {mean}");
    assert!((0.01..=0.10).contains(&rejected), "rejection rate {rejected}");
    assert!((0.40..=0.60).contains(&below_half), "share below 0.5 {below_half}");
}

#[test]
fn test_true_effect_is_detected() {
    let mut rng = StdRng::seed_from_u64(2024);
    let cohort = effect_cohort(&mut rng, 300, 3f64.ln());
    let table = prepare(&cohort, &score_config().with_duration_divisor(1.0)).unwrap();
    let model = CoxModel::new().fit(table.data()).unwrap();
    let c = model.coefficient("score_binary").unwrap();

    assert!(c.p_value < 0.01, "p = {}", c.p_value);
    assert!(c.ci_lower > 1.0);
    assert!(c.hazard_ratio > 1.5 && c.hazard_ratio < 6.0);
    assert!(model.concordance.unwrap() > 0.5);
    assert!(model.likelihood_ratio.p_value < 0.01);
}

#[test]
fn test_binarization_partitions_every_cohort() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..20 {
        let mut cohort = null_cohort(&mut rng, 60);
        // knock out a few scores
        let mut with_gaps = CohortTable::new("PATIENT", cohort.columns().to_vec());
        for row in cohort.rows() {
            let mut values = row.values.clone();
            if rng.gen_bool(0.1) {
                values[2] = None;
            }
            with_gaps.push_row(row.id.clone(), values).unwrap();
        }
        cohort = with_gaps;

        let present = cohort
            .column_values("score")
            .unwrap()
            .iter()
            .flatten()
            .count();
        let table = prepare(&cohort, &score_config()).unwrap();
        let high = table.rows_where("score_binary", 1.0).unwrap().len();
        let low = table.rows_where("score_binary", 0.0).unwrap().len();

        assert_eq!(high + low, present);
        assert_eq!(high + low + table.exclusions().len(), cohort.n_rows());
        assert!(high.abs_diff(low) <= 1);
    }
}

#[test]
fn test_kaplan_meier_is_monotone_for_random_strata() {
    let mut rng = StdRng::seed_from_u64(5);
    let km = KaplanMeier::new();
    for _ in 0..50 {
        let n = rng.gen_range(1..40);
        // coarse times so ties happen
        let times: Array1<f64> = (0..n).map(|_| rng.gen_range(0..20) as f64).collect();
        let events: Array1<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
        let curve = km.fit("s", times.view(), events.view()).unwrap();

        assert_eq!(curve.points[0].survival, 1.0);
        for pair in curve.points.windows(2) {
            assert!(pair[1].survival <= pair[0].survival);
        }
        for p in &curve.points {
            assert!((0.0..=1.0).contains(&p.ci_lower) && (0.0..=1.0).contains(&p.ci_upper));
            assert!(p.ci_lower <= p.survival + 1e-12 && p.survival <= p.ci_upper + 1e-12);
        }
        assert_eq!(curve.n_observations(), n);
    }
}

#[test]
fn test_refit_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(11);
    let cohort = null_cohort(&mut rng, 100);
    let table = prepare(&cohort, &score_config()).unwrap();
    let model = CoxModel::new();

    let first = model.fit(table.data()).unwrap();
    let second = model.fit(table.data()).unwrap();
    assert_eq!(first.coefficients, second.coefficients);
    assert_eq!(first.covariance, second.covariance);
}

#[test]
fn test_tied_times_fit_with_efron() {
    // whole-month durations force many ties
    let times = vec![1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 5.0, 5.0, 6.0];
    let events = vec![true, true, false, true, true, true, false, true, true, false, true, true];
    let x = vec![1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
    let data = SurvivalData::new(times, events, Array2::from_shape_vec((12, 1), x).unwrap()).unwrap();

    let model = CoxModel::new().fit(&data).unwrap();
    let c = &model.coefficients[0];
    // Breslow handling of the tied deaths lands elsewhere
    assert_relative_eq!(c.coefficient, -0.166775, epsilon = 1e-5);
    assert_relative_eq!(c.hazard_ratio, 0.846390, epsilon = 1e-5);
}

#[test]
fn test_collinear_scores_are_reported() {
    let mut table = CohortTable::new(
        "PATIENT",
        vec!["DSS.time".into(), "DSS".into(), "a".into(), "b".into()],
    );
    let rows = [
        (100.0, 1.0, 0.1), (200.0, 1.0, 0.9), (300.0, 0.0, 0.2), (400.0, 1.0, 0.8),
        (500.0, 1.0, 0.3), (600.0, 0.0, 0.7), (700.0, 1.0, 0.4), (800.0, 1.0, 0.6),
    ];
    for (i, (days, event, score)) in rows.iter().enumerate() {
        // b is a copy of a, so their binaries coincide
        table
            .push_row(format!("P{i}"), vec![Some(*days), Some(*event), Some(*score), Some(*score)])
            .unwrap();
    }
    let config = PrepareConfig::default()
        .with_score_columns(vec!["a".into(), "b".into()])
        .with_categorical_columns(vec![]);
    let analysis = prepare(&table, &config).unwrap();

    assert!(matches!(
        CoxModel::new().fit(analysis.data()),
        Err(SurvivalError::SingularInformation { .. })
    ));
}

#[test]
fn test_pipeline_from_slides_to_report() {
    let clinical_csv = "\
PATIENT,gender,DSS.time,DSS,MSI
P01,MALE,120,1,0
P02,FEMALE,240,1,0
P03,MALE,300,0,1
P04,FEMALE,410,1,0
P05,MALE,530,0,0
P06,FEMALE,610,1,1
P07,MALE,700,0,0
P08,FEMALE,820,1,0
P09,MALE,950,0,1
P10,FEMALE,1010,1,0
P11,MALE,1180,0,0
P12,FEMALE,1300,1,1
";
    let clinical = CohortTable::from_reader(clinical_csv.as_bytes(), "PATIENT").unwrap();
    let stroma = [0.81, 0.75, 0.12, 0.66, 0.22, 0.91, 0.35, 0.15, 0.44, 0.58, 0.29, 0.10];

    let mapping_csv: String = std::iter::once("FILENAME,PATIENT\n".to_string())
        .chain((1..=12).map(|i| format!("P{i:02}.npy,P{i:02}\n")))
        .collect();
    let mapping = SlideMapping::from_reader(mapping_csv.as_bytes()).unwrap();
    let slides: Vec<SlideRecord> = mapping.records(Path::new(""));
    let extractor = |slide: &Path| -> tissue_survival::Result<BTreeMap<String, f64>> {
        let stem = slide.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let index: usize = stem[1..].parse().unwrap_or(1);
        Ok(BTreeMap::from([
            ("str_fraction".to_string(), stroma[index - 1]),
            ("tum_fraction".to_string(), 1.0 - stroma[index - 1]),
        ]))
    };

    let cohort = assemble_cohort(&clinical, &slides, &extractor).unwrap();
    assert_eq!(cohort.n_rows(), 12);

    let mut config = AnalysisConfig::default();
    config.prepare.score_columns = vec!["str_fraction".into()];
    let report = run_analysis(&cohort, &config).unwrap();

    assert_eq!(report.model.coefficients.len(), 2);
    assert_eq!(report.table.medians()[0].0, "str_fraction");
    let curves = &report.comparison.curves;
    assert_eq!(curves.high.n_observations() + curves.low.n_observations(), 12);
    assert!((0.0..=1.0).contains(&report.comparison.log_rank.p_value));

    let fractions = &report.score_summaries[0];
    assert_eq!(fractions.count, 12);
    assert_relative_eq!(fractions.max, 0.91, epsilon = 1e-12);
    assert_eq!(cohort.text_cell("P01", "gender"), Some("MALE"));
}

use tissue_survival::{prepare, CohortTable, CoxModel, PrepareConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Tissue-fraction Cox regression - basic usage");
    println!("============================================\n");

    // days to disease-specific death, event flag, slide fractions, MSI status
    let csv = "\
PATIENT,DSS.time,DSS,str_fraction,tum_fraction,MSI
TCGA-01,95,1,0.72,0.21,0
TCGA-02,180,1,0.64,0.30,0
TCGA-03,240,0,0.18,0.71,1
TCGA-04,310,1,0.55,0.38,0
TCGA-05,365,1,0.31,0.60,0
TCGA-06,420,0,0.12,0.80,0
TCGA-07,515,1,0.81,0.15,1
TCGA-08,600,0,0.27,0.66,0
TCGA-09,710,1,0.44,0.49,0
TCGA-10,790,0,NA,0.52,0
TCGA-11,880,1,0.35,0.58,1
TCGA-12,1020,0,0.09,0.85,0
TCGA-13,1150,1,0.58,0.33,0
TCGA-14,1300,0,0.22,0.70,1
TCGA-15,1460,0,0.40,0.51,0
TCGA-16,1620,1,0.15,0.79,0
";
    let cohort = CohortTable::from_reader(csv.as_bytes(), "PATIENT")?;

    println!("Cohort:");
    println!("  - patients: {}", cohort.n_rows());
    println!("  - columns: {}", cohort.columns().join(", "));
    println!();

    let config = PrepareConfig::default()
        .with_score_columns(vec!["str_fraction".into()]);
    let table = prepare(&cohort, &config)?;

    println!("Median thresholds:");
    for (score, median) in table.medians() {
        println!("  - {score}: {median:.3}");
    }
    for exclusion in table.exclusions() {
        println!("  - excluded {} (missing {})", exclusion.patient, exclusion.missing.join(", "));
    }
    println!();

    let model = CoxModel::new().fit(table.data())?;
    println!("{model}");

    if let Some(best) = model.most_significant() {
        println!(
            "Most significant: {} (HR {:.2}, 95% CI {:.2}-{:.2}, p = {:.4})",
            best.name, best.hazard_ratio, best.ci_lower, best.ci_upper, best.p_value
        );
    }
    println!("Partial AIC: {:.3}", model.aic_partial());

    Ok(())
}

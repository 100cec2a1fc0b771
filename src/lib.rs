//! # tissue survival
//!
//! survival analysis for tissue-fraction biomarkers from segmented whole-slide images
//!
//! ## what you get
//!
//! - cohort tables joined from slide fractions + clinical records
//! - median binarization of continuous scores, per cohort
//! - cox regression (efron ties, newton-raphson) w/ wald p-values & 95% CIs
//! - kaplan-meier curves w/ greenwood bounds
//! - two-sample log-rank test
//! - csv tables a plotting tool can draw from
//!
//! ## quick start
//!
//! ```rust
//! use tissue_survival::{CohortTable, AnalysisConfig, run_analysis};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let csv = "\
//! PATIENT,DSS.time,DSS,str_fraction,MSI
//! A,120,1,0.81,0
//! B,240,1,0.75,1
//! C,300,1,0.12,1
//! D,410,1,0.66,0
//! E,530,0,0.22,0
//! F,610,1,0.91,1
//! G,700,0,0.35,0
//! H,820,1,0.15,0
//! ";
//! let cohort = CohortTable::from_reader(csv.as_bytes(), "PATIENT")?;
//!
//! let mut config = AnalysisConfig::default();
//! config.prepare.score_columns = vec!["str_fraction".into()];
//!
//! let report = run_analysis(&cohort, &config)?;
//! println!("{}", report.model);
//! println!("log-rank p = {:.3}", report.comparison.log_rank.p_value);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod cohort;
pub mod config;
pub mod data;
pub mod error;
pub mod kaplan_meier;
pub mod logging;
pub mod logrank;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod prepare;
pub mod report;

pub use analysis::{run_analysis, AnalysisReport};
pub use cohort::{CohortTable, FractionExtractor};
pub use config::AnalysisConfig;
pub use data::SurvivalData;
pub use error::{Result, SurvivalError};
pub use kaplan_meier::{KaplanMeier, SurvivalCurve};
pub use logrank::{log_rank_test, LogRankResult};
pub use model::{CoxModel, FittedModel};
pub use prepare::{prepare, AnalysisTable, PrepareConfig};

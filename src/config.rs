use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use crate::{
    error::{Result, SurvivalError},
    kaplan_meier::{ConfidenceTransform, KaplanMeier},
    model::CoxModel,
    optimization::OptimizationConfig,
    prepare::PrepareConfig,
};

/// regression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub l2_penalty: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let defaults = OptimizationConfig::default();
        Self {
            l2_penalty: defaults.l2_penalty,
            max_iterations: defaults.max_iterations,
            tolerance: defaults.tolerance,
        }
    }
}

/// everything one analysis run needs; every field falls back to its default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub prepare: PrepareConfig,
    pub model: ModelConfig,
    pub confidence_transform: ConfidenceTransform,
    pub alpha: f64, // shared by the hazard-ratio and survival-curve intervals
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prepare: PrepareConfig::default(),
            model: ModelConfig::default(),
            confidence_transform: ConfidenceTransform::LogLog,
            alpha: 0.05,
        }
    }
}

impl AnalysisConfig {
    /// load from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        serde_json::from_reader(reader).map_err(|e| {
            SurvivalError::invalid_parameter("config", format!("{}: {e}", path.display()))
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SurvivalError::invalid_parameter("config", e.to_string()))
    }

    pub fn cox_model(&self) -> CoxModel {
        CoxModel::new()
            .with_l2_penalty(self.model.l2_penalty)
            .with_max_iterations(self.model.max_iterations)
            .with_tolerance(self.model.tolerance)
            .with_alpha(self.alpha)
    }

    pub fn kaplan_meier(&self) -> KaplanMeier {
        KaplanMeier::new()
            .with_alpha(self.alpha)
            .with_transform(self.confidence_transform)
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurvivalError>;

#[derive(Error, Debug)]
pub enum SurvivalError {
    #[error("not enough data: {context}")]
    InsufficientData { context: String },

    #[error("newton-raphson didn't converge after {iterations} iterations (score norm {score_norm:.3e}): {context}")]
    Convergence {
        iterations: usize,
        score_norm: f64,
        context: String,
    },

    #[error("information matrix is singular: {message}")]
    SingularInformation { message: String },

    #[error("patient {patient} is missing a value for column {column}")]
    MissingData { patient: String, column: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("survival data is broken: {message}")]
    InvalidSurvivalData { message: String },

    #[error("numerical issues: {message}")]
    NumericalError { message: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SurvivalError {
    pub fn insufficient_data(context: impl Into<String>) -> Self {
        Self::InsufficientData { context: context.into() }
    }

    pub fn singular_information(message: impl Into<String>) -> Self {
        Self::SingularInformation { message: message.into() }
    }

    pub fn missing_data(patient: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingData {
            patient: patient.into(),
            column: column.into(),
        }
    }

    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn invalid_survival_data(message: impl Into<String>) -> Self {
        Self::InvalidSurvivalData { message: message.into() }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }

    /// prefix the context of a statistical failure, e.g. with the stratum it came from
    pub fn with_context(self, prefix: &str) -> Self {
        match self {
            Self::InsufficientData { context } => Self::InsufficientData {
                context: format!("{prefix}: {context}"),
            },
            Self::SingularInformation { message } => Self::SingularInformation {
                message: format!("{prefix}: {message}"),
            },
            Self::Convergence {
                iterations,
                score_norm,
                context,
            } => Self::Convergence {
                iterations,
                score_norm,
                context: format!("{prefix}: {context}"),
            },
            other => other,
        }
    }
}

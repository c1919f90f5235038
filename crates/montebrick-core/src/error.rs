use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonteBrickError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid catalog: {0}")]
    Catalog(String),

    #[error("Header keyword {key} not found")]
    MissingHeaderKey { key: String },

    #[error("Invalid header value for {key}: {value}")]
    InvalidHeaderValue { key: String, value: String },

    #[error("Unknown camera: {0}")]
    UnknownCamera(String),

    #[error("Not implemented for camera {camera}: {what}")]
    NotImplemented { camera: String, what: String },

    #[error("Invalid CCD name {0}: expected to start with N or S")]
    InvalidCcdName(String),

    #[error("Invalid noise parameter: {0}")]
    Noise(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Header value {name} = {value} is not valid and no corresponding environment variable is set")]
    InvalidEnvironment { name: String, value: String },

    #[error("No version information on module {module} for stage {stage}")]
    VersionNotFound { module: String, stage: String },

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("No known image matches modules {modules:?} for stage {stage}")]
    NoMatchingImage { stage: String, modules: Vec<String> },

    #[error("Invalid sim id: {0}")]
    InvalidSimId(String),

    #[error("Invalid run list line {line}: {reason}")]
    InvalidRunList { line: usize, reason: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, MonteBrickError>;

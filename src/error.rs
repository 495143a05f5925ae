use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Command `{command}` failed{}: {stderr}", exit_label(.code))]
    ExternalCommand {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Sync error: {0}")]
    Sync(String),
    #[error("Worker pool error: {0}")]
    Pool(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

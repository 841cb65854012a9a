use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration")]
    Config(#[from] flowforge_engine::ConfigError),

    #[error("workflow run failed")]
    Workflow(#[from] flowforge_engine::WorkflowError),

    #[error("failed to start async runtime")]
    Runtime(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

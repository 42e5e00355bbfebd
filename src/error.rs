use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::equation::EquationError;

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("invalid KEGG id: {0}")]
    InvalidId(String),

    #[error("unknown entity kind: {0}")]
    InvalidKind(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid annotation input: {0}")]
    InvalidInput(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("KEGG request failed: {0}")]
    KeggHttp(String),

    #[error("KEGG returned status {status}: {message}")]
    KeggStatus { status: u16, message: String },

    #[error("KEGG record for {id} has no labelled fields")]
    EmptyRecord { id: String },

    #[error("reaction {id} has an unparseable equation")]
    Equation {
        id: String,
        #[source]
        source: EquationError,
    },

    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("table {table} has no {column} column")]
    InvalidLink {
        table: &'static str,
        column: &'static str,
    },

    #[error("persisting {stage} failed for [{}]: {message}", .ids.join(", "))]
    #[diagnostic(help("chunks committed before this one are kept; re-run to resume"))]
    Persistence {
        stage: String,
        ids: Vec<String>,
        message: String,
    },

    #[error("crawl cancelled")]
    Cancelled,
}

impl GraphError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GraphError::KeggHttp(_)
                | GraphError::KeggStatus { .. }
                | GraphError::EmptyRecord { .. }
                | GraphError::Equation { .. }
        )
    }
}

impl From<rusqlite::Error> for GraphError {
    fn from(err: rusqlite::Error) -> Self {
        GraphError::Sqlite(err.to_string())
    }
}

use thiserror::Error;

use crate::Identifier;
use crate::pipeline::Stage;

/// Failure of a single outbound call.
///
/// An empty result is never an error, lookups that find nothing return an
/// empty list instead.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Request to '{url}' failed with status {status}")]
    Status { url: String, status: u16 },

    #[cfg(feature = "http")]
    #[error("Couldn't reach the remote service.\n{0}")]
    Transport(#[from] reqwest::Error),

    #[error("Couldn't parse the embedded payload.\n{0}")]
    Payload(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// A resolution task that was aborted by a failed lookup.
#[derive(Debug, Error)]
#[error("Spell {root} failed after stage {stage}:\n{source}")]
pub struct TaskFailure {
    pub root: Identifier,
    /// Last stage the task had completed.
    pub stage: Stage,
    #[source]
    pub source: LookupError,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Couldn't look up matching spells.\n{0}")]
    Roots(#[source] LookupError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Couldn't read the environment settings.\n{0}")]
    Load(#[from] config::ConfigError),

    #[error("Setting '{0}' must be {1}")]
    Invalid(&'static str, &'static str),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Query is empty")]
pub struct EmptyQuery;

//! @ai:module:intent Define error types for the submission pipeline
//! @ai:module:layer domain
//! @ai:module:public_api Error, Result
//! @ai:module:stateless true

use std::path::PathBuf;
use thiserror::Error;

/// @ai:intent Unified error type for all pipeline operations
///
/// Ingestion errors (Archive, ConfigResolution, Score) are local to one
/// archive and never roll back rows already recorded. DuplicatePath means a
/// concurrent writer won the insert race and is treated as success by
/// callers. Publish errors are local to one campaign's publication.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unreadable archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("no configuration resolvable for {path}: {reason}")]
    ConfigResolution { path: PathBuf, reason: String },

    #[error("scoring failed: {message}\n{diagnostic}")]
    Score { message: String, diagnostic: String },

    #[error("submission path already recorded: {0}")]
    DuplicatePath(String),

    #[error("publish failed for campaign {campaign}: {message}")]
    Publish { campaign: String, message: String },

    #[error("invalid campaign file {path}: {message}")]
    CampaignFile { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

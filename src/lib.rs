//! @ai:module:intent Submission intake, scoring and best-result publication
//! @ai:module:layer application
//! @ai:module:public_api config, scanner, archive, vars, scorer, store, best, ingest, publish, report

pub mod archive;
pub mod best;
pub mod config;
pub mod error;
pub mod ingest;
pub mod publish;
pub mod report;
pub mod scanner;
pub mod scorer;
pub mod store;
pub mod vars;

pub use best::{BestResult, BestSolution, BestTracker};
pub use config::{Campaign, CampaignFile, CampaignSet, Tools};
pub use error::{Error, Result};
pub use ingest::{ingest, IngestOptions, IngestSummary};
pub use publish::Publisher;
pub use report::ReportWriter;
pub use scanner::ArchiveScanner;
pub use scorer::{Score, ScoreSolution, Scorer};
pub use store::{NewSubmission, SubmissionRow, SubmissionStore};

/// Blog Service Library
///
/// Data access and HTTP surface for posts, comments, tags and the
/// post/tag association.
///
/// # Modules
///
/// - `db`: listing filters, guarded writes and one repository per table
/// - `handlers`: HTTP request handlers
/// - `models`: Data structures for posts, comments, tags
/// - `middleware`: bearer-token identity
/// - `validation`: field-level input checks
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Store round-trip metrics
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod validation;

pub use config::Config;
pub use error::{AppError, Result};

//! Optimistic concurrency control
//!
//! Every mutable row carries `updated_at` as its version. Updates name both
//! the primary key and the version the caller last read, and assign a new
//! version in the same statement. No row locks are taken.

use crate::error::{AppError, Result};
use crate::models::{Comment, Post, Tag};
use chrono::{DateTime, Utc};

/// SQL expression for the next version of the row being updated.
///
/// Strictly greater than the stored version even if the clock stalls or
/// steps backwards.
pub const NEXT_VERSION: &str = "GREATEST(clock_timestamp(), updated_at + interval '1 microsecond')";

/// Entities protected by a version token.
pub trait Versioned {
    fn version(&self) -> DateTime<Utc>;
    fn set_version(&mut self, version: DateTime<Utc>);
}

impl Versioned for Post {
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_version(&mut self, version: DateTime<Utc>) {
        self.updated_at = version;
    }
}

impl Versioned for Comment {
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_version(&mut self, version: DateTime<Utc>) {
        self.updated_at = version;
    }
}

impl Versioned for Tag {
    fn version(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn set_version(&mut self, version: DateTime<Utc>) {
        self.updated_at = version;
    }
}

/// Outcome of a version-conditioned `UPDATE ... RETURNING updated_at`.
///
/// No returned row means the presented version is stale.
pub fn conditioned_write(written: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
    written.ok_or(AppError::EditConflict)
}

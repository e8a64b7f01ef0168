//! Storage gateway for the staging table.
//!
//! The gateway only executes queries; validation and lifecycle rules live in
//! [`crate::staging`]. Production uses [`ScyllaGateway`]; tests use the
//! in-memory gateway from `test_support`.

pub mod config;
pub mod error;
pub mod schema;
pub mod scylla_gateway;

use std::time::Duration;

use crate::models::EmailRecord;

pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use scylla_gateway::ScyllaGateway;

/// Lifetime of a staged row before the store expires it.
pub const STAGING_TTL: Duration = Duration::from_secs(300);

/// Opaque position inside a server-side paged scan.
///
/// A cursor belongs to exactly one scan; it is passed into a page query and
/// the query hands back the cursor for the following page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageCursor {
    #[default]
    Start,
    Resume(Vec<u8>),
    Exhausted,
}

impl PageCursor {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PageCursor::Exhausted)
    }
}

/// One page of rows plus the cursor for the page after it.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub rows: Vec<EmailRecord>,
    pub next: PageCursor,
}

/// Query surface of the staging table.
#[rocket::async_trait]
pub trait StorageGateway: Send + Sync {
    /// Insert (or overwrite) a row keyed by `(email, magic_number)` that expires after `ttl`.
    async fn insert(&self, record: &EmailRecord, ttl: Duration) -> StorageResult<()>;

    /// All live rows sharing a magic number.
    async fn select_by_magic_number(&self, magic_number: i32) -> StorageResult<Vec<EmailRecord>>;

    /// Fetch one page of a recipient's rows starting at `cursor`.
    async fn select_page(
        &self,
        email: &str,
        page_size: i32,
        cursor: PageCursor,
    ) -> StorageResult<Page>;

    /// Number of live rows for a recipient.
    async fn count(&self, email: &str) -> StorageResult<i64>;

    /// Remove the row addressed by `(email, magic_number)`.
    async fn delete(&self, email: &str, magic_number: i32) -> StorageResult<()>;
}

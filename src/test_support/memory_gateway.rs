//! In-process storage gateway for tests, with the same observable behaviour as
//! the Scylla table: rows keyed by `(email, magic_number)`, clustered by magic
//! number within a recipient, expired after their TTL, paged with opaque cursors.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::storage::{Page, PageCursor, StorageError, StorageGateway, StorageResult};
use crate::models::EmailRecord;

#[derive(Debug, Clone)]
struct Entry {
    record: EmailRecord,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<(String, i32), Entry>,
    clock_offset: Duration,
    fail_deletes_for: Option<String>,
}

impl Inner {
    fn now(&self) -> Instant {
        Instant::now() + self.clock_offset
    }

    fn live_for<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        let now = self.now();
        self.rows
            .range((email.to_string(), i32::MIN)..=(email.to_string(), i32::MAX))
            .map(|(_, entry)| entry)
            .filter(move |entry| entry.expires_at > now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the gateway's clock forward, expiring rows whose TTL has passed.
    pub fn advance(&self, by: Duration) {
        self.inner.lock().clock_offset += by;
    }

    /// Make every delete for `email` fail until cleared with `None`.
    pub fn fail_deletes_for(&self, email: Option<&str>) {
        self.inner.lock().fail_deletes_for = email.map(str::to_string);
    }

    /// Number of live rows across all recipients.
    pub fn live_rows(&self) -> usize {
        let inner = self.inner.lock();
        let now = inner.now();
        inner.rows.values().filter(|entry| entry.expires_at > now).count()
    }
}

fn encode_cursor(magic_number: i32) -> PageCursor {
    PageCursor::Resume(magic_number.to_be_bytes().to_vec())
}

fn decode_cursor(bytes: &[u8]) -> StorageResult<i32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StorageError::rows("malformed paging state"))?;
    Ok(i32::from_be_bytes(raw))
}

#[rocket::async_trait]
impl StorageGateway for MemoryGateway {
    async fn insert(&self, record: &EmailRecord, ttl: Duration) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        let expires_at = inner.now() + ttl;
        inner.rows.insert(
            (record.email.clone(), record.magic_number),
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn select_by_magic_number(&self, magic_number: i32) -> StorageResult<Vec<EmailRecord>> {
        let inner = self.inner.lock();
        let now = inner.now();
        Ok(inner
            .rows
            .values()
            .filter(|entry| entry.record.magic_number == magic_number && entry.expires_at > now)
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn select_page(
        &self,
        email: &str,
        page_size: i32,
        cursor: PageCursor,
    ) -> StorageResult<Page> {
        let after = match &cursor {
            PageCursor::Start => Bound::Unbounded,
            PageCursor::Resume(bytes) => Bound::Excluded(decode_cursor(bytes)?),
            PageCursor::Exhausted => {
                return Ok(Page {
                    rows: Vec::new(),
                    next: PageCursor::Exhausted,
                });
            }
        };

        let inner = self.inner.lock();
        let page_size = usize::try_from(page_size.max(1)).unwrap_or(1);

        let mut remaining = inner.live_for(email).filter(|entry| match after {
            Bound::Excluded(last) => entry.record.magic_number > last,
            _ => true,
        });

        let rows: Vec<EmailRecord> = remaining
            .by_ref()
            .take(page_size)
            .map(|entry| entry.record.clone())
            .collect();

        let next = match (rows.last(), remaining.next()) {
            (Some(last), Some(_)) => encode_cursor(last.magic_number),
            _ => PageCursor::Exhausted,
        };

        Ok(Page { rows, next })
    }

    async fn count(&self, email: &str) -> StorageResult<i64> {
        let inner = self.inner.lock();
        Ok(inner.live_for(email).count() as i64)
    }

    async fn delete(&self, email: &str, magic_number: i32) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.fail_deletes_for.as_deref() == Some(email) {
            return Err(StorageError::Rows(format!("delete rejected for {email}")));
        }
        inner.rows.remove(&(email.to_string(), magic_number));
        Ok(())
    }
}

use std::ops::ControlFlow;
use std::time::Duration;

use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::response::PagingState;
use scylla::response::query_result::QueryResult;
use scylla::statement::prepared::PreparedStatement;

use super::schema::{self, TABLE};
use super::{Page, PageCursor, StorageConfig, StorageError, StorageGateway, StorageResult};
use crate::models::EmailRecord;

/// Prepared statements for every query the gateway issues.
#[derive(Debug)]
struct Statements {
    insert: PreparedStatement,
    select_by_magic_number: PreparedStatement,
    select_by_email: PreparedStatement,
    count: PreparedStatement,
    delete: PreparedStatement,
}

/// Storage gateway backed by a ScyllaDB / Cassandra cluster.
pub struct ScyllaGateway {
    session: Session,
    statements: Statements,
}

impl ScyllaGateway {
    /// Connect, bootstrap the schema and prepare all statements.
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        log::info!("connecting to storage nodes {:?}", config.nodes);

        let mut builder = SessionBuilder::new().known_nodes(&config.nodes);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.user(user, password);
        }
        let session = builder.build().await?;

        schema::run_bootstrap(&session, config).await?;
        Self::with_session(session, config).await
    }

    /// Prepare statements against an existing session whose schema is already in place.
    pub async fn with_session(session: Session, config: &StorageConfig) -> StorageResult<Self> {
        let ks = &config.keyspace;

        let insert = session
            .prepare(format!(
                "INSERT INTO {ks}.{TABLE} (email, title, content, magic_number) VALUES (?, ?, ?, ?) USING TTL ?"
            ))
            .await?;
        let select_by_magic_number = session
            .prepare(format!(
                "SELECT email, title, content, magic_number FROM {ks}.{TABLE} WHERE magic_number = ?"
            ))
            .await?;
        let select_by_email = session
            .prepare(format!(
                "SELECT email, title, content, magic_number FROM {ks}.{TABLE} WHERE email = ?"
            ))
            .await?;
        let count = session
            .prepare(format!("SELECT COUNT(*) FROM {ks}.{TABLE} WHERE email = ?"))
            .await?;
        let delete = session
            .prepare(format!(
                "DELETE FROM {ks}.{TABLE} WHERE email = ? AND magic_number = ?"
            ))
            .await?;

        Ok(Self {
            session,
            statements: Statements {
                insert,
                select_by_magic_number,
                select_by_email,
                count,
                delete,
            },
        })
    }
}

fn decode_records(result: QueryResult) -> StorageResult<Vec<EmailRecord>> {
    let rows = result.into_rows_result().map_err(StorageError::rows)?;
    rows.rows::<EmailRecord>()
        .map_err(StorageError::rows)?
        .map(|row| row.map_err(StorageError::rows))
        .collect()
}

fn paging_state(cursor: &PageCursor) -> PagingState {
    match cursor {
        PageCursor::Resume(bytes) => PagingState::new_from_raw_bytes(bytes.as_slice()),
        PageCursor::Start | PageCursor::Exhausted => PagingState::start(),
    }
}

#[rocket::async_trait]
impl StorageGateway for ScyllaGateway {
    async fn insert(&self, record: &EmailRecord, ttl: Duration) -> StorageResult<()> {
        let ttl_secs = i32::try_from(ttl.as_secs())
            .map_err(|_| StorageError::Config(format!("ttl {ttl:?} out of range")))?;

        self.session
            .execute_unpaged(
                &self.statements.insert,
                (
                    record.email.as_str(),
                    record.title.as_str(),
                    record.content.as_str(),
                    record.magic_number,
                    ttl_secs,
                ),
            )
            .await?;
        Ok(())
    }

    async fn select_by_magic_number(&self, magic_number: i32) -> StorageResult<Vec<EmailRecord>> {
        let result = self
            .session
            .execute_unpaged(&self.statements.select_by_magic_number, (magic_number,))
            .await?;
        decode_records(result)
    }

    async fn select_page(
        &self,
        email: &str,
        page_size: i32,
        cursor: PageCursor,
    ) -> StorageResult<Page> {
        if cursor.is_exhausted() {
            return Ok(Page {
                rows: Vec::new(),
                next: PageCursor::Exhausted,
            });
        }

        let mut statement = self.statements.select_by_email.clone();
        statement.set_page_size(page_size);

        let (result, paging_response) = self
            .session
            .execute_single_page(&statement, (email,), paging_state(&cursor))
            .await?;

        let next = match paging_response.into_paging_control_flow() {
            ControlFlow::Continue(state) => state
                .as_bytes_slice()
                .map(|bytes| PageCursor::Resume(bytes.to_vec()))
                .unwrap_or(PageCursor::Exhausted),
            ControlFlow::Break(()) => PageCursor::Exhausted,
        };

        Ok(Page {
            rows: decode_records(result)?,
            next,
        })
    }

    async fn count(&self, email: &str) -> StorageResult<i64> {
        let result = self
            .session
            .execute_unpaged(&self.statements.count, (email,))
            .await?;
        let (count,) = result
            .into_rows_result()
            .map_err(StorageError::rows)?
            .single_row::<(i64,)>()
            .map_err(StorageError::rows)?;
        Ok(count)
    }

    async fn delete(&self, email: &str, magic_number: i32) -> StorageResult<()> {
        self.session
            .execute_unpaged(&self.statements.delete, (email, magic_number))
            .await?;
        Ok(())
    }
}

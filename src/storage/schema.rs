//! Idempotent schema bootstrap for the staging keyspace.
//!
//! Runs before the server accepts requests and from the test harness. Every
//! statement uses `IF NOT EXISTS`, so repeated runs are harmless.

use scylla::client::session::Session;

use super::{StorageConfig, StorageError, StorageResult};

pub const TABLE: &str = "email";
pub const MAGIC_NUMBER_INDEX: &str = "email_magic_number_idx";

/// CQL statements that create the keyspace, the staging table and its index.
pub fn bootstrap_statements(config: &StorageConfig) -> Vec<String> {
    let ks = &config.keyspace;
    vec![
        format!(
            "CREATE KEYSPACE IF NOT EXISTS {ks} WITH replication = \
             {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
            config.replication_factor
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {ks}.{TABLE} (\
             email text, magic_number int, title text, content text, \
             PRIMARY KEY ((email), magic_number))"
        ),
        format!("CREATE INDEX IF NOT EXISTS {MAGIC_NUMBER_INDEX} ON {ks}.{TABLE} (magic_number)"),
    ]
}

/// Apply the bootstrap statements and wait for schema agreement.
pub async fn run_bootstrap(session: &Session, config: &StorageConfig) -> StorageResult<()> {
    log::info!("bootstrapping staging schema in keyspace '{}'", config.keyspace);

    for statement in bootstrap_statements(config) {
        session.query_unpaged(statement, ()).await?;
    }

    session
        .await_schema_agreement()
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

    log::info!("staging schema up to date");
    Ok(())
}

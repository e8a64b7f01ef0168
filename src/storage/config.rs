use std::env;

use super::{StorageError, StorageResult};

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Connection and schema settings for the wide-column store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub nodes: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u32,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> StorageResult<Self> {
        let nodes = parse_nodes(&env_string("SCYLLA_NODES", "127.0.0.1:9042"));
        let keyspace = env_string("SCYLLA_KEYSPACE", "mail_stager");

        Self::new(nodes, keyspace).map(|config| Self {
            replication_factor: env_u32("SCYLLA_REPLICATION_FACTOR", 1).max(1),
            username: env_optional("SCYLLA_USERNAME"),
            password: env_optional("SCYLLA_PASSWORD"),
            ..config
        })
    }

    /// Build a config for explicit nodes and keyspace, validating both.
    pub fn new(nodes: Vec<String>, keyspace: impl Into<String>) -> StorageResult<Self> {
        let keyspace = keyspace.into();

        if nodes.is_empty() {
            return Err(StorageError::Config("at least one node is required".into()));
        }
        if !is_valid_identifier(&keyspace) {
            return Err(StorageError::Config(format!(
                "invalid keyspace name '{keyspace}'"
            )));
        }

        Ok(Self {
            nodes,
            keyspace,
            replication_factor: 1,
            username: None,
            password: None,
        })
    }
}

fn parse_nodes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .map(str::to_string)
        .collect()
}

// Keyspace names are interpolated into CQL text, so only unquoted identifiers pass.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= 48 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

use rocket_okapi::okapi::schemars::JsonSchema;
use scylla::DeserializeRow;
use serde::{Deserialize, Serialize};

// ===== Staged Email =====

/// An email waiting in the staging table for dispatch.
///
/// Fields missing from a JSON body decode to their zero value so that
/// incompleteness is reported by validation rather than by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, DeserializeRow)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailRecord {
    pub email: String,
    pub title: String,
    pub content: String,
    pub magic_number: i32,
}

impl EmailRecord {
    pub fn new(
        email: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        magic_number: i32,
    ) -> Self {
        Self {
            email: email.into(),
            title: title.into(),
            content: content.into(),
            magic_number,
        }
    }
}

// ===== Request / Response Payloads =====

/// Body of `POST /send`. Only the magic number is read; other fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SendRequest {
    pub magic_number: i32,
}

/// Outcome of a send-and-purge run for one magic number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub magic_number: i32,
    pub sent: usize,
    pub purged: usize,
}

/// Result of a paginated view over one recipient's staged emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    Page(Vec<EmailRecord>),
    NoMoreRecords,
}

pub const NO_EMAILS_MESSAGE: &str = "There is no emails to display";

/// Wire shape of `GET /view/<email>`: either the page as an array or a bare message string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ViewResponse {
    Emails(Vec<EmailRecord>),
    Message(String),
}

impl From<ViewOutcome> for ViewResponse {
    fn from(outcome: ViewOutcome) -> Self {
        match outcome {
            ViewOutcome::Page(emails) => ViewResponse::Emails(emails),
            ViewOutcome::NoMoreRecords => ViewResponse::Message(NO_EMAILS_MESSAGE.to_string()),
        }
    }
}

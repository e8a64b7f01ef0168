use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use rocket_okapi::OpenApiError;
use serde::Serialize;
use std::io::Cursor;

use crate::staging::StagingError;

#[derive(Debug)]
pub enum ApiError {
    StorageError(String),
    MailError(String),
    /// Rendered as a bare JSON string, matching the service's message bodies.
    BadRequest(String),
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::StorageError(_) | ApiError::InternalError(_) => Status::InternalServerError,
            ApiError::MailError(_) => Status::BadGateway,
            ApiError::BadRequest(_) => Status::BadRequest,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let json = match self {
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                serde_json::to_string(&msg)
            }
            ApiError::StorageError(msg) => {
                log::error!("storage error: {}", msg);
                serde_json::to_string(&ErrorResponse {
                    error: "StorageError".to_string(),
                    message: msg,
                })
            }
            ApiError::MailError(msg) => {
                log::error!("mail error: {}", msg);
                serde_json::to_string(&ErrorResponse {
                    error: "MailError".to_string(),
                    message: msg,
                })
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                serde_json::to_string(&ErrorResponse {
                    error: "InternalError".to_string(),
                    message: msg,
                })
            }
        }
        .unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        Ok(Responses::default())
    }
}

impl From<StagingError> for ApiError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::Validation(e) => ApiError::BadRequest(e.public_message().to_string()),
            StagingError::Storage(e) => ApiError::StorageError(e.to_string()),
            StagingError::Dispatch(e) => ApiError::MailError(e.to_string()),
            err @ StagingError::PartialDispatch { .. } => ApiError::MailError(err.to_string()),
            err @ StagingError::Purge { .. } => ApiError::StorageError(err.to_string()),
        }
    }
}

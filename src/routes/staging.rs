//! Staging endpoints: accept, view and dispatch queued emails.

use rocket::serde::json::{self, Json};
use rocket::State;
use rocket_okapi::openapi;

use crate::error::ApiError;
use crate::models::{EmailRecord, SendReport, SendRequest, ViewResponse};
use crate::staging::SharedRepository;
use crate::validation::INCOMPLETE_MESSAGE;

/// Undecodable bodies are answered like incomplete ones.
fn decoded<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ApiError> {
    body.map(Json::into_inner).map_err(|e| {
        log::debug!("rejecting undecodable body: {}", e);
        ApiError::BadRequest(INCOMPLETE_MESSAGE.to_string())
    })
}

/// Stage an email for later dispatch. Rows expire after five minutes.
#[openapi(tag = "Staging")]
#[post("/post", data = "<record>")]
pub async fn post_message(
    repo: &State<SharedRepository>,
    record: Result<Json<EmailRecord>, json::Error<'_>>,
) -> Result<(), ApiError> {
    let record = decoded(record)?;
    repo.create(&record).await?;
    Ok(())
}

/// Send every staged email sharing the given magic number, then delete them.
#[openapi(tag = "Staging")]
#[post("/send", data = "<request>")]
pub async fn send_messages(
    repo: &State<SharedRepository>,
    request: Result<Json<SendRequest>, json::Error<'_>>,
) -> Result<Json<SendReport>, ApiError> {
    let request = decoded(request)?;
    let report = repo.send_pending(request.magic_number).await?;
    Ok(Json(report))
}

/// One page (four rows) of the emails staged for a recipient.
///
/// `page` defaults to 1 when absent or not a number.
#[openapi(tag = "Staging")]
#[get("/view/<email>?<page>")]
pub async fn view_messages(
    repo: &State<SharedRepository>,
    email: String,
    page: Option<i64>,
) -> Result<Json<ViewResponse>, ApiError> {
    let outcome = repo.view_page(page.unwrap_or(1), &email).await?;
    Ok(Json(outcome.into()))
}

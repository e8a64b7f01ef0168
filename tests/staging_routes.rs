use mail_stager::api_routes;
use mail_stager::models::{EmailRecord, NO_EMAILS_MESSAGE, SendReport};
use mail_stager::test_support::{MemoryHarness, TestRocketBuilder};
use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use rocket::serde::json::{Value, json};

fn client_for(harness: &MemoryHarness) -> Client {
    TestRocketBuilder::new()
        .mount_routes(api_routes())
        .manage_repository(harness.repository.clone())
        .blocking_client()
}

fn post(client: &Client, body: Value) -> Status {
    client
        .post("/post")
        .header(ContentType::JSON)
        .body(body.to_string())
        .dispatch()
        .status()
}

fn stage(client: &Client, email: &str, title: &str, magic_number: i32) {
    let status = post(
        client,
        json!({
            "email": email,
            "title": title,
            "content": format!("content of {title}"),
            "magicNumber": magic_number
        }),
    );
    assert_eq!(status, Status::Ok);
}

#[test]
fn post_with_missing_field_reports_fill_all_fields() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);

    let response = client
        .post("/post")
        .header(ContentType::JSON)
        .body(json!({"email": "a@example.com", "title": "t", "magicNumber": 1}).to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
    let body: String = response.into_json().expect("JSON string body");
    assert_eq!(body, "Fill all fields!");
    assert_eq!(harness.gateway.live_rows(), 0);
}

#[test]
fn post_with_malformed_address_is_rejected_without_write() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);

    let status = post(
        &client,
        json!({"email": "not-an-address", "title": "t", "content": "c", "magicNumber": 1}),
    );

    assert_eq!(status, Status::BadRequest);
    assert_eq!(harness.gateway.live_rows(), 0);
}

#[test]
fn undecodable_post_body_gets_json_bad_request() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);

    let response = client
        .post("/post")
        .header(ContentType::JSON)
        .body(json!({"email": "a@example.com", "magicNumber": "x"}).to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.content_type(), Some(ContentType::JSON));
    let body: String = response.into_json().expect("JSON string body");
    assert_eq!(body, "Fill all fields!");
    assert_eq!(harness.gateway.live_rows(), 0);

    let malformed = client
        .post("/post")
        .header(ContentType::JSON)
        .body("{not json")
        .dispatch();
    assert_eq!(malformed.status(), Status::BadRequest);
    let body: String = malformed.into_json().expect("JSON string body");
    assert_eq!(body, "Fill all fields!");
}

#[test]
fn send_without_magic_number_is_rejected() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);
    stage(&client, "e@example.com", "kept", 5);

    for body in [json!({}), json!({"magicNumber": 0}), json!({"magicNumber": "five"})] {
        let response = client
            .post("/send")
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest, "body {body}");
        let message: String = response.into_json().expect("JSON string body");
        assert_eq!(message, "Fill all fields!");
    }

    assert!(harness.mailer.sent().is_empty());
    assert_eq!(harness.gateway.live_rows(), 1);
}

#[test]
fn view_pages_through_recipient_records() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);
    for magic in 1..=5 {
        stage(&client, "a@example.com", &format!("title {magic}"), magic);
    }

    let first: Vec<EmailRecord> = client
        .get("/view/a@example.com")
        .dispatch()
        .into_json()
        .expect("page one");
    assert_eq!(
        first.iter().map(|r| r.magic_number).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(first[0].title, "title 1");

    let second: Vec<EmailRecord> = client
        .get("/view/a@example.com?page=2")
        .dispatch()
        .into_json()
        .expect("page two");
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].magic_number, 5);

    let third = client.get("/view/a@example.com?page=3").dispatch();
    assert_eq!(third.status(), Status::Ok);
    let message: String = third.into_json().expect("message string");
    assert_eq!(message, NO_EMAILS_MESSAGE);
}

#[test]
fn non_numeric_page_falls_back_to_first_page() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);
    stage(&client, "b@example.com", "only", 3);

    let rows: Vec<EmailRecord> = client
        .get("/view/b@example.com?page=abc")
        .dispatch()
        .into_json()
        .expect("first page");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "only");
}

#[test]
fn send_mails_group_and_purges_it() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);
    stage(&client, "c@example.com", "hello", 42);
    stage(&client, "c@example.com", "other group", 43);

    let response = client
        .post("/send")
        .header(ContentType::JSON)
        .body(json!({"magicNumber": 42}).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let report: SendReport = response.into_json().expect("report");
    assert_eq!(report.sent, 1);
    assert_eq!(report.purged, 1);

    let sent = harness.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].email, "c@example.com");
    assert_eq!(sent[0].title, "hello");
    assert_eq!(sent[0].content, "content of hello");

    let remaining: Vec<EmailRecord> = client
        .get("/view/c@example.com")
        .dispatch()
        .into_json()
        .expect("remaining page");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].magic_number, 43);

    let again: SendReport = client
        .post("/send")
        .header(ContentType::JSON)
        .body(json!({"email": "ignored@example.com", "magicNumber": 42}).to_string())
        .dispatch()
        .into_json()
        .expect("second report");
    assert_eq!(again.sent, 0);
    assert_eq!(harness.mailer.sent().len(), 1);
}

#[test]
fn mail_failure_surfaces_as_bad_gateway() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);
    stage(&client, "d@example.com", "doomed", 7);
    harness.mailer.fail_after(0);

    let response = client
        .post("/send")
        .header(ContentType::JSON)
        .body(json!({"magicNumber": 7}).to_string())
        .dispatch();

    assert_eq!(response.status(), Status::BadGateway);
    let body: Value = response.into_json().expect("error body");
    assert_eq!(body["error"], "MailError");
    assert_eq!(harness.gateway.live_rows(), 1);
}

#[test]
fn openapi_document_lists_staging_routes() {
    let harness = MemoryHarness::new();
    let client = client_for(&harness);

    let doc: Value = client
        .get("/openapi.json")
        .dispatch()
        .into_json()
        .expect("openapi document");
    let paths = doc["paths"].as_object().expect("paths object");
    assert!(paths.contains_key("/post"));
    assert!(paths.contains_key("/send"));
    assert!(paths.contains_key("/view/{email}"));
}

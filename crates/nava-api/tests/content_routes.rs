mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};

use common::{INGEST_KEY, RecordingSms, TestApp, app, build};
use nava_feed::ApprovalMatch;

const PHONE: &str = "9876543210";

async fn upload(app: &TestApp, token: &str, phone: &str) -> String {
    let (status, body) = app
        .call(
            "POST",
            "/digitalcontent/upload",
            Some(token),
            Some(json!({ "phoneNumber": phone, "photography": "https://cdn/p.jpg", "caption": "Lanes" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["entry"]["id"].as_str().unwrap().to_string()
}

async fn ingest(app: &TestApp, key: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method("POST")
        .uri("/whatsapp/media")
        .header("content-type", "application/json");
    if let Some(key) = key {
        req = req.header("x-ingest-key", key);
    }
    app.send(req.body(Body::from(body.to_string())).unwrap()).await
}

fn reel(number: &str) -> Value {
    json!({
        "waNumber": number,
        "message": "Cricket after school",
        "type": "video",
        "mediaUrl": "https://media/reel.mp4",
        "response": "Thanks, we got your reel!"
    })
}

#[tokio::test]
async fn upload_needs_a_token() {
    let app = app();
    let (status, body) = app
        .call("POST", "/digitalcontent/upload", None, Some(json!({ "phoneNumber": PHONE })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn uploaded_entries_show_in_the_feed() {
    let app = app();
    let (token, _) = app.signup(PHONE).await;
    let id = upload(&app, &token, PHONE).await;

    let (status, body) = app.call("GET", "/digitalcontent/all", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["name"], "Asha");
    assert_eq!(entries[0]["status"], "pending");
    assert_eq!(entries[0]["sourceStatus"], "Not Approved");

    let (status, body) = app.call("GET", &format!("/digitalcontent/by-phone/{}", PHONE), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn approving_and_engaging_with_an_entry() {
    let app = app();
    let (token, _) = app.signup(PHONE).await;
    let id = upload(&app, &token, PHONE).await;
    let uri = format!("/digitalcontent/update/{}", id);

    let (status, body) = app
        .call(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({
                "status": "Approved",
                "like": { "userId": "u-1", "action": "like" },
                "comment": { "name": "Ravi", "text": "Lovely" }
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["entry"]["status"], "approved");
    assert_eq!(body["entry"]["likes"], json!(["u-1"]));
    assert_eq!(body["entry"]["comments"][0]["name"], "Ravi");

    let (_, body) = app.call("GET", "/digitalcontent/approved", None, None).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);

    let (status, body) = app.call("GET", "/digitalcontent/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["totalUsers"], 1);
    assert_eq!(body["totalPosts"], 1);
    assert_eq!(body["totalApprovedPosts"], 1);
}

#[tokio::test]
async fn update_validation_and_missing_entries() {
    let app = app();
    let (token, _) = app.signup(PHONE).await;
    let id = upload(&app, &token, PHONE).await;

    let (status, _) = app
        .call("PUT", &format!("/digitalcontent/update/{}", id), Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "PUT",
            "/digitalcontent/update/00000000-0000-4000-8000-000000000000",
            Some(&token),
            Some(json!({ "caption": "hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Entry not found");

    let (status, _) = app
        .call("PUT", "/digitalcontent/update/42", Some(&token), Some(json!({ "caption": "hi" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_entry_then_not_found() {
    let app = app();
    let (token, _) = app.signup(PHONE).await;
    let id = upload(&app, &token, PHONE).await;
    let uri = format!("/digitalcontent/{}", id);

    let (status, body) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn whatsapp_media_is_filed_and_logged() {
    let app = app();

    let (status, _) = ingest(&app, None, reel(PHONE)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ingest(&app, Some("wrong"), reel(PHONE)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ingest(&app, Some(INGEST_KEY), reel(PHONE)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["entry"]["source"], "WhatsApp");
    assert_eq!(body["entry"]["reels"], "https://media/reel.mp4");
    assert_eq!(body["entry"]["name"], "User 3210");

    let (status, body) = app.call("GET", &format!("/by-wa-number/{}", PHONE), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let log = body.as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["waNumber"], "whatsapp:+919876543210");
    assert_eq!(log[0]["type"], "video");

    let (_, body) = app.call("GET", &format!("/digitalcontent/by-phone/{}", PHONE), None, None).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn legacy_approval_hides_whatsapp_approvals() {
    for (approval, expected) in [(ApprovalMatch::Legacy, 0), (ApprovalMatch::Canonical, 1)] {
        let app = build(approval, RecordingSms::default(), Some(INGEST_KEY.to_string()));
        let (token, _) = app.signup(PHONE).await;
        let (_, body) = ingest(&app, Some(INGEST_KEY), reel(PHONE)).await;
        let id = body["entry"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .call(
                "PUT",
                &format!("/digitalcontent/update/{}", id),
                Some(&token),
                Some(json!({ "status": "approved" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entry"]["sourceStatus"], "approved");

        let (_, body) = app.call("GET", "/digitalcontent/approved", None, None).await;
        assert_eq!(body["entries"].as_array().unwrap().len(), expected, "{:?}", approval);
    }
}

#[tokio::test]
async fn ingestion_is_refused_without_a_configured_key() {
    let app = build(ApprovalMatch::Legacy, RecordingSms::default(), None);
    let (status, body) = ingest(&app, Some(INGEST_KEY), reel(PHONE)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

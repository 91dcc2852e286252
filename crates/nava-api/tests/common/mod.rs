#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use futures_util::future::{BoxFuture, FutureExt, ready};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use nava_api::auth::AppStateInner;
use nava_api::notify::{NotifyError, SmsSender};
use nava_api::router;
use nava_db::Database;
use nava_feed::ApprovalMatch;

pub const INGEST_KEY: &str = "test-ingest-key";
const JWT_SECRET: &str = "integration-test-secret";

/// Keeps every message instead of sending it. Fails each send when
/// `failing` is set.
#[derive(Default)]
pub struct RecordingSms {
    pub sent: Mutex<Vec<(String, String)>>,
    pub failing: bool,
}

impl RecordingSms {
    /// Password carried by the most recent message to `phone`.
    pub fn last_password(&self, phone: &str) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, message) = sent.iter().rev().find(|(to, _)| to == phone).expect("no SMS sent");
        message.rsplit(": ").next().unwrap().to_string()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl SmsSender for RecordingSms {
    fn send<'a>(&'a self, phone_number: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        self.sent.lock().unwrap().push((phone_number.to_string(), message.to_string()));
        let result = if self.failing {
            Err(NotifyError::Rejected { status: 503, body: "gateway down".into() })
        } else {
            Ok(())
        };
        ready(result).boxed()
    }
}

pub struct TestApp {
    pub router: Router,
    pub sms: Arc<RecordingSms>,
}

pub fn app() -> TestApp {
    build(ApprovalMatch::Legacy, RecordingSms::default(), Some(INGEST_KEY.to_string()))
}

pub fn build(approval: ApprovalMatch, sms: RecordingSms, ingest_key: Option<String>) -> TestApp {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let sms = Arc::new(sms);
    let state = AppStateInner::new(db, approval, sms.clone(), JWT_SECRET.to_string(), ingest_key);
    TestApp { router: router(state), sms }
}

impl TestApp {
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(req.body(body).unwrap()).await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Registers `phone` and returns (token, user id).
    pub async fn signup(&self, phone: &str) -> (String, String) {
        let (status, body) = self
            .call("POST", "/signup", None, Some(serde_json::json!({ "phoneNumber": phone, "name": "Asha" })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let token = body["token"].as_str().unwrap().to_string();

        let password = self.sms.last_password(phone);
        let (_, login) = self
            .call(
                "POST",
                "/login",
                None,
                Some(serde_json::json!({ "phoneNumber": phone, "password": password })),
            )
            .await;
        let id = login["user"]["id"].as_str().unwrap().to_string();
        (token, id)
    }
}

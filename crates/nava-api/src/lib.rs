pub mod auth;
pub mod content;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod users;
pub mod whatsapp;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Every route, without transport layers (CORS, tracing); the binary adds
/// those.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/update-password", post(auth::update_password))
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/by-wa-number/{wa_number}", get(whatsapp::by_wa_number))
        .route("/whatsapp/media", post(whatsapp::ingest_media))
        .route("/digitalcontent/by-phone/{phone_number}", get(content::by_phone))
        .route("/digitalcontent/all", get(content::all))
        .route("/digitalcontent/approved", get(content::approved))
        .route("/digitalcontent/metrics", get(content::metrics))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/update-user/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/digitalcontent/upload", post(content::upload))
        .route("/digitalcontent/update/{id}", put(content::update_entry))
        .route("/digitalcontent/{id}", delete(content::delete_entry))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

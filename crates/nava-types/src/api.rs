use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ContentStatus, FeedEntry, FeedMetrics, Role, SocialLinks, User, deserialize_flag,
};

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub phone_number: String,
    pub role: Role,
    pub exp: usize,
}

// -- Generic --

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub message: String,
}

impl AckResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

// -- Auth --

// Required strings default to empty so that a missing field is reported as
// 400 by the handler instead of a deserialization rejection.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub phone_number: String,
    pub name: Option<String>,
    pub age: Option<String>,
    pub photo: Option<String>,
    pub profession: Option<String>,
    #[serde(default, rename = "residentOfDharavi", deserialize_with = "deserialize_flag")]
    pub resident: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub social_media_influencer: Option<bool>,
    #[serde(default, rename = "socialMediaInfluencerOn")]
    pub influencer_platforms: Vec<String>,
    pub referral_code: Option<String>,
    #[serde(default)]
    pub social_media_links: SocialLinks,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub token: String,
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

// -- Users --

/// Partial profile update. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub age: Option<String>,
    pub photo: Option<String>,
    pub code: Option<String>,
    pub profession: Option<String>,
    #[serde(default, rename = "residentOfDharavi", deserialize_with = "deserialize_flag")]
    pub resident: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub social_media_influencer: Option<bool>,
    #[serde(rename = "socialMediaInfluencerOn")]
    pub influencer_platforms: Option<Vec<String>>,
    pub social_media_links: Option<SocialLinks>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

// -- Digital content --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub phone_number: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Like,
    Unlike,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    #[serde(default)]
    pub user_id: String,
    pub action: LikeAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryRequest {
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: Option<ContentStatus>,
    pub caption: Option<String>,
    pub like: Option<LikeRequest>,
    pub comment: Option<CommentRequest>,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub success: bool,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub success: bool,
    pub entry: FeedEntry,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub metrics: FeedMetrics,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

// -- WhatsApp ingestion --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMediaRequest {
    #[serde(default)]
    pub wa_number: String,
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub media_url: String,
    pub response: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestMediaResponse {
    pub success: bool,
    pub message_id: Uuid,
    /// Feed entry created from the message, when its media type maps to a
    /// content category.
    pub entry: Option<FeedEntry>,
}

//! Database row types. These map directly to SQLite rows.
//! Distinct from nava-types API models to keep the DB layer independent.
//! List-valued columns hold JSON text.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub phone_number: String,
    pub phone_key: String,
    pub name: Option<String>,
    pub age: Option<String>,
    pub photo: Option<String>,
    pub code: String,
    pub profession: Option<String>,
    pub resident: Option<bool>,
    pub social_media_influencer: Option<bool>,
    pub influencer_platforms: String,
    pub password: String,
    pub referral_code: Option<String>,
    pub role: String,
    pub social_media_links: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns to overwrite on a user. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub phone_key: Option<String>,
    pub age: Option<String>,
    pub photo: Option<String>,
    pub code: Option<String>,
    pub profession: Option<String>,
    pub resident: Option<bool>,
    pub social_media_influencer: Option<bool>,
    pub influencer_platforms: Option<String>,
    pub social_media_links: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DigitalRow {
    pub id: String,
    pub phone_number: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: String,
    pub caption: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct WaEntryRow {
    pub id: String,
    pub phone_number: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub file_name: Option<String>,
    pub status: String,
    pub chat_history: String,
    pub caption: String,
    pub uploaded_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Field overwrites shared by both content collections. `None` keeps the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaPatch {
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: Option<String>,
    pub caption: Option<String>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct LikeRow {
    pub entry_id: String,
    pub user_key: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub entry_id: String,
    pub name: String,
    pub text: String,
    pub posted_at: String,
}

#[derive(Debug, Clone)]
pub struct MediaMessageRow {
    pub id: String,
    pub wa_number: String,
    pub message: Option<String>,
    pub media_type: String,
    pub media_url: String,
    pub timestamp: String,
    pub response: Option<String>,
    pub created_at: String,
}

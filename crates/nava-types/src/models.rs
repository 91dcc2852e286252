use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Moderator => "moderator",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "moderator" => Ok(Self::Moderator),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Public view of a registered user. The password hash never leaves nava-db.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub phone_number: String,
    pub age: Option<String>,
    pub photo: Option<String>,
    pub code: String,
    pub profession: Option<String>,
    #[serde(rename = "residentOfDharavi")]
    pub resident: Option<bool>,
    pub social_media_influencer: Option<bool>,
    #[serde(rename = "socialMediaInfluencerOn")]
    pub influencer_platforms: Vec<String>,
    pub referral_code: Option<String>,
    pub role: Role,
    pub social_media_links: SocialLinks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown value '{0}'")]
pub struct UnknownValue(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSocialLinks {
    #[error("social link platform names must not be empty")]
    EmptyPlatform,
    #[error("social link for '{0}' must not be empty")]
    EmptyLink(String),
}

/// Platform name -> profile link. Keys and values are trimmed and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SocialLinks(BTreeMap<String, String>);

impl SocialLinks {
    pub fn new(links: BTreeMap<String, String>) -> Result<Self, InvalidSocialLinks> {
        let mut clean = BTreeMap::new();
        for (platform, link) in links {
            let platform = platform.trim();
            let link = link.trim();
            if platform.is_empty() {
                return Err(InvalidSocialLinks::EmptyPlatform);
            }
            if link.is_empty() {
                return Err(InvalidSocialLinks::EmptyLink(platform.to_string()));
            }
            clean.insert(platform.to_string(), link.to_string());
        }
        Ok(Self(clean))
    }

    pub fn get(&self, platform: &str) -> Option<&str> {
        self.0.get(platform).map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for SocialLinks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        SocialLinks::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Accepts `true`/`false` as well as the "Yes"/"No" strings older clients send.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "yes" | "y" | "true" => Ok(Some(true)),
            "no" | "n" | "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("expected yes/no, got '{}'", other))),
        },
    }
}

// -- Content --

/// Which content store produced a feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Web,
    WhatsApp,
}

/// Moderation status shared by every content store. Each store maps its own
/// stored values onto this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for ContentStatus {
    type Err = UnknownValue;

    /// Canonical names plus every spelling the stores have used
    /// ("Approved", "Not Approved", "submitted", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "submitted" | "not approved" | "not_approved" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

impl TryFrom<String> for ContentStatus {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub name: String,
    pub text: String,
    pub posted_at: DateTime<Utc>,
}

/// One step of a WhatsApp conversation attached to a messaging entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum ChatTurn {
    #[serde(rename_all = "camelCase")]
    Inbound {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        media_type: Option<String>,
        #[serde(default)]
        media_url: Option<String>,
        at: DateTime<Utc>,
    },
    Outbound {
        text: String,
        at: DateTime<Utc>,
    },
}

/// Normalized, identity-enriched projection of a content record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: Uuid,
    pub source: Source,
    pub phone_number: String,
    pub name: String,
    pub user_photo: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: ContentStatus,
    pub source_status: String,
    pub caption: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMetrics {
    pub total_users: usize,
    pub total_posts: usize,
    pub total_approved_posts: usize,
}

/// Inbound WhatsApp media message, kept as an append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMessage {
    pub id: Uuid,
    pub wa_number: String,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub media_type: String,
    pub media_url: String,
    pub timestamp: DateTime<Utc>,
    pub response: Option<String>,
}

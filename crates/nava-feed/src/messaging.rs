use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use nava_db::models::{MediaPatch, WaEntryRow};
use nava_db::{Collection, ContentFilter, Database, to_db_time};
use nava_types::models::{ChatTurn, ContentStatus, Source};

use crate::store::{
    ContentRecord, ContentStore, Engagement, FieldUpdate, Mutation, Selection, apply_mutation, parse_id,
    parse_time,
};

/// Status vocabulary of WhatsApp uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessagingStatus {
    Submitted,
    Approved,
    Rejected,
}

impl MessagingStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    fn canonical(self) -> ContentStatus {
        match self {
            Self::Submitted => ContentStatus::Pending,
            Self::Approved => ContentStatus::Approved,
            Self::Rejected => ContentStatus::Rejected,
        }
    }

    fn from_canonical(status: ContentStatus) -> Self {
        match status {
            ContentStatus::Pending => Self::Submitted,
            ContentStatus::Approved => Self::Approved,
            ContentStatus::Rejected => Self::Rejected,
        }
    }
}

/// Content category a WhatsApp media message is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Photography,
    Reels,
    ShortFilms,
}

impl Medium {
    /// Maps the webhook's media type. Types outside the three categories
    /// (documents, audio, stickers) are logged but not filed.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type.trim().to_ascii_lowercase().as_str() {
            "photography" | "photo" | "image" => Some(Self::Photography),
            "reels" | "reel" | "video" => Some(Self::Reels),
            "shortfilms" | "shortfilm" | "short_film" | "short_films" => Some(Self::ShortFilms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessagingEntry {
    pub phone_number: String,
    pub medium: Medium,
    pub media_url: String,
    pub file_name: Option<String>,
    pub caption: String,
    pub chat_history: Vec<ChatTurn>,
}

/// WhatsApp uploads (`wa_entries`).
pub struct MessagingStore {
    db: Arc<Database>,
}

impl MessagingStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, entry: NewMessagingEntry, uploaded_at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = to_db_time(Utc::now());
        let url = Some(entry.media_url);
        let (photography, reels, short_films) = match entry.medium {
            Medium::Photography => (url, None, None),
            Medium::Reels => (None, url, None),
            Medium::ShortFilms => (None, None, url),
        };

        self.db.insert_wa_entry(&WaEntryRow {
            id: id.to_string(),
            phone_number: entry.phone_number,
            photography,
            reels,
            short_films,
            file_name: entry.file_name,
            status: MessagingStatus::Submitted.as_str().to_string(),
            chat_history: serde_json::to_string(&entry.chat_history)?,
            caption: entry.caption,
            uploaded_at: to_db_time(uploaded_at),
            created_at: now.clone(),
            updated_at: now,
        })?;
        Ok(id)
    }

    fn normalize(&self, rows: Vec<WaEntryRow>) -> Result<Vec<ContentRecord>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut engagement = Engagement::load(&self.db, Collection::WaEntries, &ids)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status = MessagingStatus::parse(&row.status)
                    .map(MessagingStatus::canonical)
                    .unwrap_or_else(|| {
                        warn!("Unknown WhatsApp status '{}' on entry '{}'", row.status, row.id);
                        ContentStatus::Pending
                    });
                let caption = if row.caption.trim().is_empty() {
                    first_inbound_text(&row.chat_history, &row.id).unwrap_or_default()
                } else {
                    row.caption
                };
                let (likes, comments) = engagement.take(&row.id);
                ContentRecord {
                    id: parse_id(&row.id),
                    source: Source::WhatsApp,
                    created_at: parse_time(&row.uploaded_at, &row.id),
                    phone_number: row.phone_number,
                    photography: row.photography,
                    reels: row.reels,
                    short_films: row.short_films,
                    status,
                    source_status: row.status,
                    caption,
                    likes,
                    comments,
                }
            })
            .collect())
    }
}

/// Entries without a caption show what the sender wrote alongside the media.
fn first_inbound_text(chat_history: &str, id: &str) -> Option<String> {
    let turns: Vec<ChatTurn> = serde_json::from_str(chat_history)
        .map_err(|e| warn!("Unreadable chat history on entry '{}': {}", id, e))
        .ok()?;
    turns.into_iter().find_map(|turn| match turn {
        ChatTurn::Inbound { text: Some(text), .. } if !text.trim().is_empty() => Some(text),
        _ => None,
    })
}

impl ContentStore for MessagingStore {
    fn source(&self) -> Source {
        Source::WhatsApp
    }

    fn native_status(&self, status: ContentStatus) -> &'static str {
        MessagingStatus::from_canonical(status).as_str()
    }

    fn list(&self, selection: Selection<'_>) -> Result<Vec<ContentRecord>> {
        let filter = match selection {
            Selection::All => ContentFilter::All,
            // An empty key would match every number.
            Selection::Phone { key, .. } if key.is_empty() => return Ok(vec![]),
            Selection::Phone { key, .. } => ContentFilter::PhoneSuffix(key),
            Selection::Status(status) => ContentFilter::Status(status),
        };
        let rows = self.db.list_wa_entries(filter)?;
        self.normalize(rows)
    }

    fn get(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        match self.db.get_wa_entry(&id.to_string())? {
            Some(row) => Ok(self.normalize(vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn contains(&self, id: Uuid) -> Result<bool> {
        self.db.content_exists(Collection::WaEntries, &id.to_string())
    }

    fn apply(&self, id: Uuid, mutation: &Mutation) -> Result<bool> {
        apply_mutation(&self.db, Collection::WaEntries, id, mutation, |fields: &FieldUpdate| MediaPatch {
            photography: fields.photography.clone(),
            reels: fields.reels.clone(),
            short_films: fields.short_films.clone(),
            status: fields.status.map(|s| MessagingStatus::from_canonical(s).as_str().to_string()),
            caption: fields.caption.clone(),
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        self.db.delete_content(Collection::WaEntries, &id.to_string())
    }

    fn count(&self, status: Option<&str>) -> Result<usize> {
        self.db.count_content(Collection::WaEntries, status)
    }

    fn phone_numbers(&self) -> Result<Vec<String>> {
        self.db.content_phone_numbers(Collection::WaEntries)
    }
}

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use nava_db::models::{DigitalRow, MediaPatch};
use nava_db::{Collection, ContentFilter, Database, to_db_time};
use nava_types::models::{ContentStatus, Source};

use crate::store::{
    ContentRecord, ContentStore, Engagement, FieldUpdate, Mutation, Selection, apply_mutation, parse_id,
    parse_time,
};

/// Status vocabulary of web uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebStatus {
    Approved,
    NotApproved,
}

impl WebStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::NotApproved => "Not Approved",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Approved" => Some(Self::Approved),
            "Not Approved" => Some(Self::NotApproved),
            _ => None,
        }
    }

    fn canonical(self) -> ContentStatus {
        match self {
            Self::Approved => ContentStatus::Approved,
            Self::NotApproved => ContentStatus::Pending,
        }
    }

    /// Web uploads have no separate rejected state.
    fn from_canonical(status: ContentStatus) -> Self {
        match status {
            ContentStatus::Approved => Self::Approved,
            ContentStatus::Pending | ContentStatus::Rejected => Self::NotApproved,
        }
    }
}

/// New web upload, before it is stored.
#[derive(Debug, Clone, Default)]
pub struct NewWebEntry {
    pub phone_number: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub caption: String,
}

/// Web uploads (`digital_content`).
pub struct WebStore {
    db: Arc<Database>,
}

impl WebStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, entry: NewWebEntry, at: DateTime<Utc>) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = to_db_time(at);
        self.db.insert_digital(&DigitalRow {
            id: id.to_string(),
            phone_number: entry.phone_number,
            photography: entry.photography,
            reels: entry.reels,
            short_films: entry.short_films,
            status: WebStatus::NotApproved.as_str().to_string(),
            caption: entry.caption,
            created_at: now.clone(),
            updated_at: now,
        })?;
        Ok(id)
    }

    fn normalize(&self, rows: Vec<DigitalRow>) -> Result<Vec<ContentRecord>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut engagement = Engagement::load(&self.db, Collection::Digital, &ids)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let status = WebStatus::parse(&row.status)
                    .map(WebStatus::canonical)
                    .unwrap_or_else(|| {
                        warn!("Unknown web status '{}' on content '{}'", row.status, row.id);
                        ContentStatus::Pending
                    });
                let (likes, comments) = engagement.take(&row.id);
                ContentRecord {
                    id: parse_id(&row.id),
                    source: Source::Web,
                    created_at: parse_time(&row.created_at, &row.id),
                    phone_number: row.phone_number,
                    photography: row.photography,
                    reels: row.reels,
                    short_films: row.short_films,
                    status,
                    source_status: row.status,
                    caption: row.caption,
                    likes,
                    comments,
                }
            })
            .collect())
    }
}

impl ContentStore for WebStore {
    fn source(&self) -> Source {
        Source::Web
    }

    fn native_status(&self, status: ContentStatus) -> &'static str {
        WebStatus::from_canonical(status).as_str()
    }

    fn list(&self, selection: Selection<'_>) -> Result<Vec<ContentRecord>> {
        let filter = match selection {
            Selection::All => ContentFilter::All,
            Selection::Phone { raw, .. } => ContentFilter::Phone(raw),
            Selection::Status(status) => ContentFilter::Status(status),
        };
        let rows = self.db.list_digital(filter)?;
        self.normalize(rows)
    }

    fn get(&self, id: Uuid) -> Result<Option<ContentRecord>> {
        match self.db.get_digital(&id.to_string())? {
            Some(row) => Ok(self.normalize(vec![row])?.pop()),
            None => Ok(None),
        }
    }

    fn contains(&self, id: Uuid) -> Result<bool> {
        self.db.content_exists(Collection::Digital, &id.to_string())
    }

    fn apply(&self, id: Uuid, mutation: &Mutation) -> Result<bool> {
        apply_mutation(&self.db, Collection::Digital, id, mutation, |fields: &FieldUpdate| MediaPatch {
            photography: fields.photography.clone(),
            reels: fields.reels.clone(),
            short_films: fields.short_films.clone(),
            status: fields.status.map(|s| WebStatus::from_canonical(s).as_str().to_string()),
            caption: fields.caption.clone(),
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool> {
        self.db.delete_content(Collection::Digital, &id.to_string())
    }

    fn count(&self, status: Option<&str>) -> Result<usize> {
        self.db.count_content(Collection::Digital, status)
    }

    fn phone_numbers(&self) -> Result<Vec<String>> {
        self.db.content_phone_numbers(Collection::Digital)
    }
}

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use nava_db::models::{CommentRow, MediaPatch};
use nava_db::{Collection, Database, is_foreign_key_violation, parse_db_time, to_db_time};
use nava_types::models::{Comment, ContentStatus, FeedEntry, Source};

/// A content record in the shape every store normalizes to, before identity
/// enrichment.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub id: Uuid,
    pub source: Source,
    pub phone_number: String,
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: ContentStatus,
    /// Status exactly as the owning store spells it.
    pub source_status: String,
    pub caption: String,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn into_feed_entry(self, name: String, user_photo: String) -> FeedEntry {
        FeedEntry {
            id: self.id,
            source: self.source,
            phone_number: self.phone_number,
            name,
            user_photo,
            photography: self.photography,
            reels: self.reels,
            short_films: self.short_films,
            status: self.status,
            source_status: self.source_status,
            caption: self.caption,
            likes: self.likes,
            comments: self.comments,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Selection<'a> {
    All,
    /// `raw` as the client sent it, `key` its last ten digits. Each store
    /// decides which one it matches on.
    Phone { raw: &'a str, key: &'a str },
    /// Stored status value, compared exactly.
    Status(&'a str),
}

/// Field overwrites. Present fields replace the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub photography: Option<String>,
    pub reels: Option<String>,
    pub short_films: Option<String>,
    pub status: Option<ContentStatus>,
    pub caption: Option<String>,
}

impl FieldUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One atomic change to a single record.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetFields(FieldUpdate),
    Like(String),
    Unlike(String),
    Comment(Comment),
}

/// A content collection with its own field names and status vocabulary.
pub trait ContentStore: Send + Sync {
    fn source(&self) -> Source;

    /// Stored value meaning `status` in this store.
    fn native_status(&self, status: ContentStatus) -> &'static str;

    fn list(&self, selection: Selection<'_>) -> Result<Vec<ContentRecord>>;

    fn get(&self, id: Uuid) -> Result<Option<ContentRecord>>;

    fn contains(&self, id: Uuid) -> Result<bool>;

    /// Returns false when the record is gone, including when it was deleted
    /// after the caller looked it up.
    fn apply(&self, id: Uuid, mutation: &Mutation) -> Result<bool>;

    /// Returns false when this store does not hold `id`.
    fn delete(&self, id: Uuid) -> Result<bool>;

    /// Record count, optionally restricted to an exact stored status value.
    fn count(&self, status: Option<&str>) -> Result<usize>;

    /// Distinct stored phone numbers.
    fn phone_numbers(&self) -> Result<Vec<String>>;
}

/// Likes and comments for a batch of entries, keyed by entry id.
#[derive(Default)]
pub(crate) struct Engagement {
    likes: HashMap<String, Vec<String>>,
    comments: HashMap<String, Vec<Comment>>,
}

impl Engagement {
    pub(crate) fn load(db: &Database, collection: Collection, ids: &[String]) -> Result<Self> {
        let mut engagement = Self::default();

        for like in db.get_likes(collection, ids)? {
            engagement.likes.entry(like.entry_id).or_default().push(like.user_key);
        }

        for row in db.get_comments(collection, ids)? {
            let posted_at = parse_time(&row.posted_at, &row.entry_id);
            engagement.comments.entry(row.entry_id).or_default().push(Comment {
                name: row.name,
                text: row.text,
                posted_at,
            });
        }

        Ok(engagement)
    }

    pub(crate) fn take(&mut self, id: &str) -> (Vec<String>, Vec<Comment>) {
        (
            self.likes.remove(id).unwrap_or_default(),
            self.comments.remove(id).unwrap_or_default(),
        )
    }
}

/// Applies `mutation` to a record of `collection`. Only the field mapping
/// (`patch`) differs between stores. Returns false when no record has `id`.
pub(crate) fn apply_mutation(
    db: &Database,
    collection: Collection,
    id: Uuid,
    mutation: &Mutation,
    patch: impl FnOnce(&FieldUpdate) -> MediaPatch,
) -> Result<bool> {
    let id = id.to_string();
    let result = match mutation {
        Mutation::SetFields(fields) => {
            let patch = patch(fields);
            if patch.is_empty() {
                db.content_exists(collection, &id)
            } else {
                db.update_content(collection, &id, &patch, &to_db_time(Utc::now()))
            }
        }
        Mutation::Like(user) => db.add_like(collection, &id, user).map(|()| true),
        Mutation::Unlike(user) => db
            .remove_like(collection, &id, user)
            .and_then(|()| db.content_exists(collection, &id)),
        Mutation::Comment(comment) => db
            .add_comment(
                collection,
                &CommentRow {
                    entry_id: id.clone(),
                    name: comment.name.clone(),
                    text: comment.text.clone(),
                    posted_at: to_db_time(comment.posted_at),
                },
            )
            .map(|()| true),
    };

    match result {
        // Likes and comments reference their entry.
        Err(e) if is_foreign_key_violation(&e) => Ok(false),
        other => other,
    }
}

pub(crate) fn parse_id(raw: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt content id '{}': {}", raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_time(raw: &str, id: &str) -> DateTime<Utc> {
    parse_db_time(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on content '{}'", raw, id);
        DateTime::default()
    })
}

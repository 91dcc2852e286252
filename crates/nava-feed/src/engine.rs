use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use nava_db::models::MediaMessageRow;
use nava_db::{Database, to_db_time};
use nava_types::api::{IngestMediaRequest, LikeAction, UpdateEntryRequest, UploadRequest};
use nava_types::models::{
    ChatTurn, Comment, ContentStatus, FeedEntry, FeedMetrics, MediaMessage, UnknownValue,
};
use nava_types::phone::{fallback_display_name, phone_key, whatsapp_address};

use crate::error::FeedError;
use crate::messaging::{Medium, MessagingStore, NewMessagingEntry};
use crate::store::{ContentRecord, ContentStore, FieldUpdate, Mutation, Selection, parse_id, parse_time};
use crate::web::{NewWebEntry, WebStore};

pub const MAX_CAPTION_CHARS: usize = 300;

/// Stored status value the approval filters have always compared against.
/// Only the web store spells approval this way.
pub const LEGACY_APPROVED: &str = "Approved";

/// How "approved" is matched when filtering and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalMatch {
    /// Every store is compared against the literal "Approved"; WhatsApp
    /// entries (stored as "approved") never match.
    #[default]
    Legacy,
    /// Every store is compared against its own spelling of approved.
    Canonical,
}

impl FromStr for ApprovalMatch {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "canonical" => Ok(Self::Canonical),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Merges both content stores into one feed and routes mutations to the
/// store that owns a record. Stores are consulted in order: web, then
/// WhatsApp.
pub struct Reconciler {
    db: Arc<Database>,
    web: Arc<WebStore>,
    messaging: Arc<MessagingStore>,
    stores: Vec<Arc<dyn ContentStore>>,
    approval: ApprovalMatch,
}

impl Reconciler {
    pub fn new(db: Arc<Database>, approval: ApprovalMatch) -> Self {
        let web = Arc::new(WebStore::new(db.clone()));
        let messaging = Arc::new(MessagingStore::new(db.clone()));
        let stores: Vec<Arc<dyn ContentStore>> = vec![web.clone(), messaging.clone()];
        Self {
            db,
            web,
            messaging,
            stores,
            approval,
        }
    }

    pub fn approval(&self) -> ApprovalMatch {
        self.approval
    }

    // -- Reads --

    pub fn list_by_phone(&self, raw: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let key = phone_key(raw);
        self.collect(|_| Selection::Phone { raw, key: &key })
    }

    pub fn list_all(&self) -> Result<Vec<FeedEntry>, FeedError> {
        self.collect(|_| Selection::All)
    }

    pub fn list_approved(&self) -> Result<Vec<FeedEntry>, FeedError> {
        self.collect(|store| Selection::Status(self.approved_value(store)))
    }

    pub fn get_entry(&self, id: Uuid) -> Result<FeedEntry, FeedError> {
        for store in &self.stores {
            if let Some(record) = store.get(id)? {
                return Ok(self.enrich(vec![record])?.remove(0));
            }
        }
        Err(FeedError::NotFound)
    }

    pub fn metrics(&self) -> Result<FeedMetrics, FeedError> {
        let mut phones = HashSet::new();
        let mut total_posts = 0;
        let mut total_approved_posts = 0;

        for store in &self.stores {
            phones.extend(
                store
                    .phone_numbers()?
                    .iter()
                    .map(|p| phone_key(p))
                    .filter(|k| !k.is_empty()),
            );
            total_posts += store.count(None)?;
            total_approved_posts += store.count(Some(self.approved_value(store.as_ref())))?;
        }

        Ok(FeedMetrics {
            total_users: phones.len(),
            total_posts,
            total_approved_posts,
        })
    }

    // -- Writes --

    pub fn create_web_entry(&self, req: &UploadRequest) -> Result<FeedEntry, FeedError> {
        let phone_number = req.phone_number.trim();
        if phone_number.is_empty() {
            return Err(FeedError::Validation("Phone number is required".into()));
        }
        let caption = req.caption.clone().unwrap_or_default();
        check_caption(&caption)?;

        let id = self.web.create(
            NewWebEntry {
                phone_number: phone_number.to_string(),
                photography: non_empty(&req.photography),
                reels: non_empty(&req.reels),
                short_films: non_empty(&req.short_films),
                caption,
            },
            Utc::now(),
        )?;
        info!("Web entry {} uploaded for {}", id, phone_number);

        self.get_entry(id)
    }

    /// Applies each requested change as its own atomic step on the owning
    /// store, in field → like → comment order. A failure part way leaves
    /// earlier steps applied.
    pub fn update_entry(&self, id: Uuid, req: &UpdateEntryRequest) -> Result<FeedEntry, FeedError> {
        let mutations = mutations_for(req)?;
        let store = self.owner(id)?;

        for mutation in &mutations {
            if !store.apply(id, mutation)? {
                return Err(FeedError::NotFound);
            }
        }
        debug!("Applied {} change(s) to {:?} entry {}", mutations.len(), store.source(), id);

        let record = store.get(id)?.ok_or(FeedError::NotFound)?;
        Ok(self.enrich(vec![record])?.remove(0))
    }

    pub fn delete_entry(&self, id: Uuid) -> Result<(), FeedError> {
        for store in &self.stores {
            if store.delete(id)? {
                info!("Deleted {:?} entry {}", store.source(), id);
                return Ok(());
            }
        }
        Err(FeedError::NotFound)
    }

    // -- WhatsApp ingestion --

    /// Logs an inbound media message and files it as a WhatsApp entry when
    /// its media type is one of the content categories.
    pub fn ingest_media_message(
        &self,
        req: &IngestMediaRequest,
    ) -> Result<(Uuid, Option<FeedEntry>), FeedError> {
        if req.wa_number.trim().is_empty() {
            return Err(FeedError::Validation("waNumber is required".into()));
        }
        if req.media_type.trim().is_empty() || req.media_url.trim().is_empty() {
            return Err(FeedError::Validation("type and mediaUrl are required".into()));
        }

        let wa_number = whatsapp_address(&req.wa_number);
        let at = req.timestamp.unwrap_or_else(Utc::now);
        let message = non_empty(&req.message);
        let response = non_empty(&req.response);

        let message_id = Uuid::new_v4();
        self.db.insert_media_message(&MediaMessageRow {
            id: message_id.to_string(),
            wa_number: wa_number.clone(),
            message: message.clone(),
            media_type: req.media_type.trim().to_string(),
            media_url: req.media_url.trim().to_string(),
            timestamp: to_db_time(at),
            response: response.clone(),
            created_at: to_db_time(Utc::now()),
        })?;

        let Some(medium) = Medium::from_media_type(&req.media_type) else {
            debug!("Media message {} of type '{}' not filed", message_id, req.media_type);
            return Ok((message_id, None));
        };

        let mut chat_history = vec![ChatTurn::Inbound {
            text: message.clone(),
            media_type: Some(req.media_type.trim().to_string()),
            media_url: Some(req.media_url.trim().to_string()),
            at,
        }];
        if let Some(text) = response {
            chat_history.push(ChatTurn::Outbound { text, at });
        }

        let entry_id = self.messaging.create(
            NewMessagingEntry {
                phone_number: wa_number.clone(),
                medium,
                media_url: req.media_url.trim().to_string(),
                file_name: req.media_url.rsplit('/').next().map(str::to_string).filter(|s| !s.is_empty()),
                caption: message.unwrap_or_default(),
                chat_history,
            },
            at,
        )?;
        info!("WhatsApp entry {} filed from message {} ({})", entry_id, message_id, wa_number);

        Ok((message_id, Some(self.get_entry(entry_id)?)))
    }

    /// Media log for one WhatsApp address, newest first.
    pub fn media_messages(&self, raw_number: &str) -> Result<Vec<MediaMessage>, FeedError> {
        let wa_number = whatsapp_address(raw_number);
        let rows = self.db.get_media_messages(&wa_number)?;
        Ok(rows
            .into_iter()
            .map(|row| MediaMessage {
                id: parse_id(&row.id),
                timestamp: parse_time(&row.timestamp, &row.id),
                wa_number: row.wa_number,
                message: row.message,
                media_type: row.media_type,
                media_url: row.media_url,
                response: row.response,
            })
            .collect())
    }

    // -- Internals --

    fn approved_value(&self, store: &dyn ContentStore) -> &'static str {
        match self.approval {
            ApprovalMatch::Legacy => LEGACY_APPROVED,
            ApprovalMatch::Canonical => store.native_status(ContentStatus::Approved),
        }
    }

    fn owner(&self, id: Uuid) -> Result<&dyn ContentStore, FeedError> {
        for store in &self.stores {
            if store.contains(id)? {
                return Ok(store.as_ref());
            }
        }
        Err(FeedError::NotFound)
    }

    fn collect<'s, F>(&self, select: F) -> Result<Vec<FeedEntry>, FeedError>
    where
        F: Fn(&dyn ContentStore) -> Selection<'s>,
    {
        let mut records = Vec::new();
        for store in &self.stores {
            records.extend(store.list(select(store.as_ref()))?);
        }

        let mut entries = self.enrich(records)?;
        // Stable: equal timestamps keep web entries ahead of WhatsApp ones.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    /// Joins records to their authors by phone key.
    fn enrich(&self, records: Vec<ContentRecord>) -> Result<Vec<FeedEntry>, FeedError> {
        let keys: Vec<String> = records
            .iter()
            .map(|r| phone_key(&r.phone_number))
            .filter(|k| !k.is_empty())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // Oldest registration wins if two accounts share a key.
        let mut authors: HashMap<String, (Option<String>, Option<String>)> = HashMap::new();
        for user in self.db.get_users_by_phone_keys(&keys)? {
            authors.entry(user.phone_key).or_insert((user.name, user.photo));
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let (name, photo) = authors
                    .get(&phone_key(&record.phone_number))
                    .cloned()
                    .unwrap_or_default();
                let name = name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| fallback_display_name(&record.phone_number));
                record.into_feed_entry(name, photo.unwrap_or_default())
            })
            .collect())
    }
}

fn mutations_for(req: &UpdateEntryRequest) -> Result<Vec<Mutation>, FeedError> {
    let mut mutations = Vec::new();

    let fields = FieldUpdate {
        photography: req.photography.clone(),
        reels: req.reels.clone(),
        short_films: req.short_films.clone(),
        status: req.status,
        caption: req.caption.clone(),
    };
    if let Some(caption) = &fields.caption {
        check_caption(caption)?;
    }
    if !fields.is_empty() {
        mutations.push(Mutation::SetFields(fields));
    }

    if let Some(like) = &req.like {
        let user = like.user_id.trim();
        if user.is_empty() {
            return Err(FeedError::Validation("like requires a userId".into()));
        }
        mutations.push(match like.action {
            LikeAction::Like => Mutation::Like(user.to_string()),
            LikeAction::Unlike => Mutation::Unlike(user.to_string()),
        });
    }

    if let Some(comment) = &req.comment {
        let (name, text) = (comment.name.trim(), comment.text.trim());
        if name.is_empty() || text.is_empty() {
            return Err(FeedError::Validation("comment requires a name and text".into()));
        }
        mutations.push(Mutation::Comment(Comment {
            name: name.to_string(),
            text: text.to_string(),
            posted_at: comment.posted_at.unwrap_or_else(Utc::now),
        }));
    }

    if mutations.is_empty() {
        return Err(FeedError::Validation("No updatable fields supplied".into()));
    }
    Ok(mutations)
}

fn check_caption(caption: &str) -> Result<(), FeedError> {
    if caption.chars().count() > MAX_CAPTION_CHARS {
        warn!("Rejected caption of {} chars", caption.chars().count());
        return Err(FeedError::Validation(format!(
            "Caption must be at most {} characters",
            MAX_CAPTION_CHARS
        )));
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

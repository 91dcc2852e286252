//! Queries for the two content collections. Web uploads live in
//! `digital_content`, WhatsApp uploads in `wa_entries`; each has its own
//! likes and comments tables with identical shape.

use crate::{Database, MAX_BATCH};
use crate::models::{CommentRow, DigitalRow, LikeRow, MediaPatch, WaEntryRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ToSql};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Digital,
    WaEntries,
}

impl Collection {
    fn table(self) -> &'static str {
        match self {
            Self::Digital => "digital_content",
            Self::WaEntries => "wa_entries",
        }
    }

    fn likes_table(self) -> &'static str {
        match self {
            Self::Digital => "digital_content_likes",
            Self::WaEntries => "wa_entry_likes",
        }
    }

    fn comments_table(self) -> &'static str {
        match self {
            Self::Digital => "digital_content_comments",
            Self::WaEntries => "wa_entry_comments",
        }
    }
}

/// Row selection for content listings.
#[derive(Debug, Clone, Copy)]
pub enum ContentFilter<'a> {
    All,
    /// Exact match on the stored phone number.
    Phone(&'a str),
    /// Stored phone number ends with these digits.
    PhoneSuffix(&'a str),
    /// Exact match on the stored status value.
    Status(&'a str),
}

impl ContentFilter<'_> {
    fn clause(&self) -> (&'static str, Option<String>) {
        match self {
            Self::All => ("", None),
            Self::Phone(p) => (" WHERE phone_number = ?1", Some(p.to_string())),
            Self::PhoneSuffix(d) => (" WHERE phone_number LIKE ?1", Some(format!("%{}", d))),
            Self::Status(s) => (" WHERE status = ?1", Some(s.to_string())),
        }
    }
}

const DIGITAL_COLUMNS: &str =
    "id, phone_number, photography, reels, short_films, status, caption, created_at, updated_at";

const WA_ENTRY_COLUMNS: &str = "id, phone_number, photography, reels, short_films, file_name, \
     status, chat_history, caption, uploaded_at, created_at, updated_at";

impl Database {
    // -- Web uploads --

    pub fn insert_digital(&self, row: &DigitalRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO digital_content ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    DIGITAL_COLUMNS
                ),
                rusqlite::params![
                    row.id,
                    row.phone_number,
                    row.photography,
                    row.reels,
                    row.short_films,
                    row.status,
                    row.caption,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_digital(&self, filter: ContentFilter<'_>) -> Result<Vec<DigitalRow>> {
        let (clause, param) = filter.clause();
        let sql = format!(
            "SELECT {} FROM digital_content{} ORDER BY created_at DESC, rowid DESC",
            DIGITAL_COLUMNS, clause
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = param.iter().map(|p| p as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), digital_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_digital(&self, id: &str) -> Result<Option<DigitalRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM digital_content WHERE id = ?1", DIGITAL_COLUMNS),
                    [id],
                    digital_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- WhatsApp uploads --

    pub fn insert_wa_entry(&self, row: &WaEntryRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO wa_entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    WA_ENTRY_COLUMNS
                ),
                rusqlite::params![
                    row.id,
                    row.phone_number,
                    row.photography,
                    row.reels,
                    row.short_films,
                    row.file_name,
                    row.status,
                    row.chat_history,
                    row.caption,
                    row.uploaded_at,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest upload first.
    pub fn list_wa_entries(&self, filter: ContentFilter<'_>) -> Result<Vec<WaEntryRow>> {
        let (clause, param) = filter.clause();
        let sql = format!(
            "SELECT {} FROM wa_entries{} ORDER BY uploaded_at DESC, rowid DESC",
            WA_ENTRY_COLUMNS, clause
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = param.iter().map(|p| p as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), wa_entry_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_wa_entry(&self, id: &str) -> Result<Option<WaEntryRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM wa_entries WHERE id = ?1", WA_ENTRY_COLUMNS),
                    [id],
                    wa_entry_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Shared --

    pub fn content_exists(&self, collection: Collection, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    &format!("SELECT 1 FROM {} WHERE id = ?1", collection.table()),
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Overwrites the fields present in `patch` in a single statement.
    /// Returns false when no row has `id`.
    pub fn update_content(
        &self,
        collection: Collection,
        id: &str,
        patch: &MediaPatch,
        updated_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE {} SET
                        photography = COALESCE(?2, photography),
                        reels = COALESCE(?3, reels),
                        short_films = COALESCE(?4, short_films),
                        status = COALESCE(?5, status),
                        caption = COALESCE(?6, caption),
                        updated_at = ?7
                     WHERE id = ?1",
                    collection.table()
                ),
                rusqlite::params![
                    id,
                    patch.photography,
                    patch.reels,
                    patch.short_films,
                    patch.status,
                    patch.caption,
                    updated_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Adds `user_key` to the entry's likes. Liking twice is a no-op.
    pub fn add_like(&self, collection: Collection, entry_id: &str, user_key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} (entry_id, user_key) VALUES (?1, ?2)",
                    collection.likes_table()
                ),
                (entry_id, user_key),
            )?;
            Ok(())
        })
    }

    pub fn remove_like(&self, collection: Collection, entry_id: &str, user_key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "DELETE FROM {} WHERE entry_id = ?1 AND user_key = ?2",
                    collection.likes_table()
                ),
                (entry_id, user_key),
            )?;
            Ok(())
        })
    }

    pub fn add_comment(&self, collection: Collection, comment: &CommentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (entry_id, name, text, posted_at) VALUES (?1, ?2, ?3, ?4)",
                    collection.comments_table()
                ),
                (&comment.entry_id, &comment.name, &comment.text, &comment.posted_at),
            )?;
            Ok(())
        })
    }

    /// Batch-fetch likes for a set of entries. Each entry's likes keep the
    /// order they were given in.
    pub fn get_likes(&self, collection: Collection, entry_ids: &[String]) -> Result<Vec<LikeRow>> {
        let mut likes = Vec::new();

        for chunk in entry_ids.chunks(MAX_BATCH) {
            self.with_conn(|conn| {
                let sql = format!(
                    "SELECT entry_id, user_key FROM {} WHERE entry_id IN ({}) ORDER BY rowid",
                    collection.likes_table(),
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                    Ok(LikeRow {
                        entry_id: row.get(0)?,
                        user_key: row.get(1)?,
                    })
                })?;
                for row in rows {
                    likes.push(row?);
                }
                Ok(())
            })?;
        }

        Ok(likes)
    }

    /// Batch-fetch comments for a set of entries, oldest first per entry.
    pub fn get_comments(&self, collection: Collection, entry_ids: &[String]) -> Result<Vec<CommentRow>> {
        let mut comments = Vec::new();

        for chunk in entry_ids.chunks(MAX_BATCH) {
            self.with_conn(|conn| {
                let sql = format!(
                    "SELECT entry_id, name, text, posted_at FROM {} WHERE entry_id IN ({}) ORDER BY id",
                    collection.comments_table(),
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                    Ok(CommentRow {
                        entry_id: row.get(0)?,
                        name: row.get(1)?,
                        text: row.get(2)?,
                        posted_at: row.get(3)?,
                    })
                })?;
                for row in rows {
                    comments.push(row?);
                }
                Ok(())
            })?;
        }

        Ok(comments)
    }

    /// Likes and comments go with the entry.
    pub fn delete_content(&self, collection: Collection, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", collection.table()), [id])?;
            Ok(changed > 0)
        })
    }

    pub fn count_content(&self, collection: Collection, status: Option<&str>) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = match status {
                Some(status) => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {} WHERE status = ?1", collection.table()),
                    [status],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", collection.table()),
                    [],
                    |row| row.get(0),
                )?,
            };
            Ok(count as usize)
        })
    }

    /// Distinct stored phone numbers in a collection.
    pub fn content_phone_numbers(&self, collection: Collection) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT DISTINCT phone_number FROM {}", collection.table()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

fn digital_from_row(row: &Row<'_>) -> rusqlite::Result<DigitalRow> {
    Ok(DigitalRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        photography: row.get(2)?,
        reels: row.get(3)?,
        short_films: row.get(4)?,
        status: row.get(5)?,
        caption: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn wa_entry_from_row(row: &Row<'_>) -> rusqlite::Result<WaEntryRow> {
    Ok(WaEntryRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        photography: row.get(2)?,
        reels: row.get(3)?,
        short_films: row.get(4)?,
        file_name: row.get(5)?,
        status: row.get(6)?,
        chat_history: row.get(7)?,
        caption: row.get(8)?,
        uploaded_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digital(id: &str, phone: &str, status: &str, at: &str) -> DigitalRow {
        DigitalRow {
            id: id.to_string(),
            phone_number: phone.to_string(),
            photography: Some(format!("https://cdn/{}.jpg", id)),
            reels: None,
            short_films: None,
            status: status.to_string(),
            caption: String::new(),
            created_at: at.to_string(),
            updated_at: at.to_string(),
        }
    }

    fn wa_entry(id: &str, phone: &str, status: &str, at: &str) -> WaEntryRow {
        WaEntryRow {
            id: id.to_string(),
            phone_number: phone.to_string(),
            photography: None,
            reels: Some(format!("https://cdn/{}.mp4", id)),
            short_films: None,
            file_name: None,
            status: status.to_string(),
            chat_history: "[]".to_string(),
            caption: String::new(),
            uploaded_at: at.to_string(),
            created_at: at.to_string(),
            updated_at: at.to_string(),
        }
    }

    #[test]
    fn filters_select_rows() {
        let db = Database::open_in_memory().unwrap();
        db.insert_digital(&digital("d1", "9876543210", "Approved", "2024-01-01T00:00:00.000000Z")).unwrap();
        db.insert_digital(&digital("d2", "9123456789", "Not Approved", "2024-01-02T00:00:00.000000Z")).unwrap();
        db.insert_wa_entry(&wa_entry("w1", "whatsapp:+919876543210", "approved", "2024-01-03T00:00:00.000000Z"))
            .unwrap();

        let all = db.list_digital(ContentFilter::All).unwrap();
        assert_eq!(all.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["d2", "d1"]);

        let by_phone = db.list_digital(ContentFilter::Phone("9876543210")).unwrap();
        assert_eq!(by_phone.len(), 1);

        let approved = db.list_digital(ContentFilter::Status("Approved")).unwrap();
        assert_eq!(approved[0].id, "d1");

        let suffix = db.list_wa_entries(ContentFilter::PhoneSuffix("9876543210")).unwrap();
        assert_eq!(suffix.len(), 1);
        assert!(db.list_wa_entries(ContentFilter::Status("Approved")).unwrap().is_empty());
    }

    #[test]
    fn unknown_status_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let res = db.insert_wa_entry(&wa_entry("w1", "whatsapp:+919876543210", "Approved", "2024-01-01T00:00:00.000000Z"));
        assert!(res.is_err());
    }

    #[test]
    fn likes_behave_as_a_set() {
        let db = Database::open_in_memory().unwrap();
        db.insert_digital(&digital("d1", "9876543210", "Approved", "2024-01-01T00:00:00.000000Z")).unwrap();

        db.add_like(Collection::Digital, "d1", "u1").unwrap();
        db.add_like(Collection::Digital, "d1", "u1").unwrap();
        db.add_like(Collection::Digital, "d1", "u2").unwrap();
        db.remove_like(Collection::Digital, "d1", "u3").unwrap();

        let likes = db.get_likes(Collection::Digital, &["d1".to_string()]).unwrap();
        assert_eq!(likes.iter().map(|l| l.user_key.as_str()).collect::<Vec<_>>(), vec!["u1", "u2"]);

        db.remove_like(Collection::Digital, "d1", "u1").unwrap();
        let likes = db.get_likes(Collection::Digital, &["d1".to_string()]).unwrap();
        assert_eq!(likes.len(), 1);
    }

    #[test]
    fn engagement_on_a_deleted_entry_is_a_foreign_key_violation() {
        let db = Database::open_in_memory().unwrap();
        db.insert_digital(&digital("d1", "9876543210", "Approved", "2024-01-01T00:00:00.000000Z")).unwrap();
        assert!(db.delete_content(Collection::Digital, "d1").unwrap());

        let err = db.add_like(Collection::Digital, "d1", "u1").unwrap_err();
        assert!(crate::is_foreign_key_violation(&err));
        assert!(!crate::is_unique_violation(&err));

        let err = db
            .add_comment(
                Collection::Digital,
                &CommentRow {
                    entry_id: "d1".to_string(),
                    name: "Ravi".to_string(),
                    text: "Nice".to_string(),
                    posted_at: "2024-01-02T00:00:00.000000Z".to_string(),
                },
            )
            .unwrap_err();
        assert!(crate::is_foreign_key_violation(&err));
    }

    #[test]
    fn engagement_lookup_spans_many_entries() {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for i in 0..1_200 {
            let id = format!("d{}", i);
            db.insert_digital(&digital(&id, "9876543210", "Approved", "2024-01-01T00:00:00.000000Z")).unwrap();
            ids.push(id);
        }
        db.add_like(Collection::Digital, "d0", "u1").unwrap();
        db.add_like(Collection::Digital, "d1199", "u2").unwrap();
        db.add_like(Collection::Digital, "d1199", "u3").unwrap();

        let likes = db.get_likes(Collection::Digital, &ids).unwrap();
        assert_eq!(likes.len(), 3);
        let last: Vec<_> = likes.iter().filter(|l| l.entry_id == "d1199").map(|l| l.user_key.as_str()).collect();
        assert_eq!(last, vec!["u2", "u3"]);
        assert!(db.get_comments(Collection::Digital, &ids).unwrap().is_empty());
    }

    #[test]
    fn patch_and_delete_cascade() {
        let db = Database::open_in_memory().unwrap();
        db.insert_wa_entry(&wa_entry("w1", "whatsapp:+919876543210", "submitted", "2024-01-01T00:00:00.000000Z"))
            .unwrap();
        db.add_comment(
            Collection::WaEntries,
            &CommentRow {
                entry_id: "w1".to_string(),
                name: "Ravi".to_string(),
                text: "Nice".to_string(),
                posted_at: "2024-01-02T00:00:00.000000Z".to_string(),
            },
        )
        .unwrap();

        let patch = MediaPatch {
            status: Some("approved".to_string()),
            caption: Some("Dharavi at dawn".to_string()),
            ..Default::default()
        };
        assert!(db.update_content(Collection::WaEntries, "w1", &patch, "2024-01-03T00:00:00.000000Z").unwrap());
        assert!(!db.update_content(Collection::Digital, "w1", &patch, "2024-01-03T00:00:00.000000Z").unwrap());

        let row = db.get_wa_entry("w1").unwrap().unwrap();
        assert_eq!(row.status, "approved");
        assert_eq!(row.caption, "Dharavi at dawn");
        assert!(row.reels.is_some());

        assert!(db.delete_content(Collection::WaEntries, "w1").unwrap());
        assert!(!db.content_exists(Collection::WaEntries, "w1").unwrap());
        assert!(db.get_comments(Collection::WaEntries, &["w1".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn counts_and_phones() {
        let db = Database::open_in_memory().unwrap();
        db.insert_digital(&digital("d1", "9876543210", "Approved", "2024-01-01T00:00:00.000000Z")).unwrap();
        db.insert_digital(&digital("d2", "9876543210", "Not Approved", "2024-01-02T00:00:00.000000Z")).unwrap();

        assert_eq!(db.count_content(Collection::Digital, None).unwrap(), 2);
        assert_eq!(db.count_content(Collection::Digital, Some("Approved")).unwrap(), 1);
        assert_eq!(db.content_phone_numbers(Collection::Digital).unwrap(), vec!["9876543210".to_string()]);
    }
}

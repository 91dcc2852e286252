use crate::{Database, MAX_BATCH};
use crate::models::{MediaMessageRow, UserPatch, UserRow};
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

const USER_COLUMNS: &str = "id, phone_number, phone_key, name, age, photo, code, profession, \
     resident, social_media_influencer, influencer_platforms, password, referral_code, role, \
     social_media_links, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    USER_COLUMNS
                ),
                rusqlite::params![
                    user.id,
                    user.phone_number,
                    user.phone_key,
                    user.name,
                    user.age,
                    user.photo,
                    user.code,
                    user.profession,
                    user.resident,
                    user.social_media_influencer,
                    user.influencer_platforms,
                    user.password,
                    user.referral_code,
                    user.role,
                    user.social_media_links,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_phone(&self, phone_number: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE phone_number = ?1", USER_COLUMNS),
                    [phone_number],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    [id],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at, rowid",
                USER_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch users by normalized phone key. Rows sharing a key come
    /// back oldest account first.
    pub fn get_users_by_phone_keys(&self, keys: &[String]) -> Result<Vec<UserRow>> {
        let mut users = Vec::new();

        for chunk in keys.chunks(MAX_BATCH) {
            self.with_conn(|conn| {
                let placeholders: Vec<String> = (1..=chunk.len()).map(|i| format!("?{}", i)).collect();
                let sql = format!(
                    "SELECT {} FROM users WHERE phone_key IN ({}) ORDER BY created_at, rowid",
                    USER_COLUMNS,
                    placeholders.join(", ")
                );

                let mut stmt = conn.prepare(&sql)?;
                for row in stmt.query_map(rusqlite::params_from_iter(chunk.iter()), user_from_row)? {
                    users.push(row?);
                }
                Ok(())
            })?;
        }

        Ok(users)
    }

    pub fn code_taken(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE code = ?1", [code], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Returns false when no user has `id`.
    pub fn update_user(&self, id: &str, patch: &UserPatch, updated_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    phone_number = COALESCE(?3, phone_number),
                    phone_key = COALESCE(?4, phone_key),
                    age = COALESCE(?5, age),
                    photo = COALESCE(?6, photo),
                    code = COALESCE(?7, code),
                    profession = COALESCE(?8, profession),
                    resident = COALESCE(?9, resident),
                    social_media_influencer = COALESCE(?10, social_media_influencer),
                    influencer_platforms = COALESCE(?11, influencer_platforms),
                    social_media_links = COALESCE(?12, social_media_links),
                    updated_at = ?13
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.name,
                    patch.phone_number,
                    patch.phone_key,
                    patch.age,
                    patch.photo,
                    patch.code,
                    patch.profession,
                    patch.resident,
                    patch.social_media_influencer,
                    patch.influencer_platforms,
                    patch.social_media_links,
                    updated_at,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_user_password(&self, id: &str, password_hash: &str, updated_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                (id, password_hash, updated_at),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Media messages --

    pub fn insert_media_message(&self, msg: &MediaMessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO media_messages
                    (id, wa_number, message, media_type, media_url, timestamp, response, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    msg.id,
                    msg.wa_number,
                    msg.message,
                    msg.media_type,
                    msg.media_url,
                    msg.timestamp,
                    msg.response,
                    msg.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn get_media_messages(&self, wa_number: &str) -> Result<Vec<MediaMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, wa_number, message, media_type, media_url, timestamp, response, created_at
                 FROM media_messages
                 WHERE wa_number = ?1
                 ORDER BY timestamp DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([wa_number], |row| {
                    Ok(MediaMessageRow {
                        id: row.get(0)?,
                        wa_number: row.get(1)?,
                        message: row.get(2)?,
                        media_type: row.get(3)?,
                        media_url: row.get(4)?,
                        timestamp: row.get(5)?,
                        response: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        phone_key: row.get(2)?,
        name: row.get(3)?,
        age: row.get(4)?,
        photo: row.get(5)?,
        code: row.get(6)?,
        profession: row.get(7)?,
        resident: row.get(8)?,
        social_media_influencer: row.get(9)?,
        influencer_platforms: row.get(10)?,
        password: row.get(11)?,
        referral_code: row.get(12)?,
        role: row.get(13)?,
        social_media_links: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn user(id: &str, phone: &str, code: &str) -> UserRow {
        UserRow {
            id: id.to_string(),
            phone_number: phone.to_string(),
            phone_key: phone.chars().rev().take(10).collect::<Vec<_>>().into_iter().rev().collect(),
            name: Some("Asha".to_string()),
            age: None,
            photo: Some("https://cdn/asha.jpg".to_string()),
            code: code.to_string(),
            profession: None,
            resident: Some(true),
            social_media_influencer: None,
            influencer_platforms: "[]".to_string(),
            password: "hash".to_string(),
            referral_code: None,
            role: "user".to_string(),
            social_media_links: "{}".to_string(),
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn duplicate_phone_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();

        let err = db.create_user(&user("u2", "9876543210", "nava000001")).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn patch_preserves_missing_fields() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();

        let patch = UserPatch {
            profession: Some("Photographer".to_string()),
            ..Default::default()
        };
        assert!(db.update_user("u1", &patch, "2024-02-01T00:00:00.000000Z").unwrap());
        assert!(!db.update_user("missing", &patch, "2024-02-01T00:00:00.000000Z").unwrap());

        let stored = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(stored.profession.as_deref(), Some("Photographer"));
        assert_eq!(stored.name.as_deref(), Some("Asha"));
        assert_eq!(stored.resident, Some(true));
        assert_eq!(stored.updated_at, "2024-02-01T00:00:00.000000Z");
    }

    #[test]
    fn batch_lookup_by_phone_key() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();
        db.create_user(&user("u2", "+919123456789", "nava456789")).unwrap();

        let found = db
            .get_users_by_phone_keys(&["9123456789".to_string(), "0000000000".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "u2");
        assert!(db.get_users_by_phone_keys(&[]).unwrap().is_empty());
    }

    #[test]
    fn batch_lookup_spans_more_keys_than_one_statement_binds() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();
        db.create_user(&user("u2", "9123456789", "nava456789")).unwrap();

        let mut keys: Vec<String> = (0..40_000).map(|i| format!("{:010}", i)).collect();
        keys.push("9876543210".to_string());
        keys.insert(0, "9123456789".to_string());

        let found = db.get_users_by_phone_keys(&keys).unwrap();
        let mut ids: Vec<_> = found.iter().map(|u| u.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["u1", "u2"]);
    }

    #[test]
    fn code_taken_tracks_stored_codes() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.code_taken("nava543210").unwrap());
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();
        assert!(db.code_taken("nava543210").unwrap());

        let err = db.create_user(&user("u2", "9111543210", "nava543210")).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn delete_reports_absent_user() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("u1", "9876543210", "nava543210")).unwrap();
        assert!(db.delete_user("u1").unwrap());
        assert!(!db.delete_user("u1").unwrap());
        assert!(db.get_user_by_phone("9876543210").unwrap().is_none());
    }

    #[test]
    fn media_messages_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for (id, ts) in [("m1", "2024-01-01T00:00:00.000000Z"), ("m2", "2024-03-01T00:00:00.000000Z")] {
            db.insert_media_message(&MediaMessageRow {
                id: id.to_string(),
                wa_number: "whatsapp:+919876543210".to_string(),
                message: None,
                media_type: "image".to_string(),
                media_url: format!("https://media/{}", id),
                timestamp: ts.to_string(),
                response: None,
                created_at: ts.to_string(),
            })
            .unwrap();
        }

        let rows = db.get_media_messages("whatsapp:+919876543210").unwrap();
        assert_eq!(rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["m2", "m1"]);
        assert!(db.get_media_messages("whatsapp:+910000000000").unwrap().is_empty());
    }
}

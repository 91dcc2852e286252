use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, content stores, media log)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                      TEXT PRIMARY KEY,
                phone_number            TEXT NOT NULL UNIQUE,
                phone_key               TEXT NOT NULL,
                name                    TEXT,
                age                     TEXT,
                photo                   TEXT,
                code                    TEXT NOT NULL UNIQUE,
                profession              TEXT,
                resident                INTEGER,
                social_media_influencer INTEGER,
                influencer_platforms    TEXT NOT NULL DEFAULT '[]',
                password                TEXT NOT NULL,
                referral_code           TEXT,
                role                    TEXT NOT NULL DEFAULT 'user'
                                        CHECK (role IN ('user', 'admin', 'moderator')),
                social_media_links      TEXT NOT NULL DEFAULT '{}',
                created_at              TEXT NOT NULL,
                updated_at              TEXT NOT NULL
            );

            CREATE INDEX idx_users_phone_key ON users(phone_key);

            -- Web uploads
            CREATE TABLE digital_content (
                id           TEXT PRIMARY KEY,
                phone_number TEXT NOT NULL,
                photography  TEXT,
                reels        TEXT,
                short_films  TEXT,
                status       TEXT NOT NULL DEFAULT 'Not Approved'
                             CHECK (status IN ('Approved', 'Not Approved')),
                caption      TEXT NOT NULL DEFAULT '' CHECK (length(caption) <= 300),
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_digital_content_phone ON digital_content(phone_number);

            CREATE TABLE digital_content_likes (
                entry_id TEXT NOT NULL REFERENCES digital_content(id) ON DELETE CASCADE,
                user_key TEXT NOT NULL,
                PRIMARY KEY (entry_id, user_key)
            );

            CREATE TABLE digital_content_comments (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id  TEXT NOT NULL REFERENCES digital_content(id) ON DELETE CASCADE,
                name      TEXT NOT NULL,
                text      TEXT NOT NULL,
                posted_at TEXT NOT NULL
            );

            CREATE INDEX idx_digital_content_comments_entry
                ON digital_content_comments(entry_id);

            -- WhatsApp uploads
            CREATE TABLE wa_entries (
                id           TEXT PRIMARY KEY,
                phone_number TEXT NOT NULL,
                photography  TEXT,
                reels        TEXT,
                short_films  TEXT,
                file_name    TEXT,
                status       TEXT NOT NULL DEFAULT 'submitted'
                             CHECK (status IN ('submitted', 'approved', 'rejected')),
                chat_history TEXT NOT NULL DEFAULT '[]',
                caption      TEXT NOT NULL DEFAULT '',
                uploaded_at  TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );

            CREATE INDEX idx_wa_entries_phone ON wa_entries(phone_number);

            CREATE TABLE wa_entry_likes (
                entry_id TEXT NOT NULL REFERENCES wa_entries(id) ON DELETE CASCADE,
                user_key TEXT NOT NULL,
                PRIMARY KEY (entry_id, user_key)
            );

            CREATE TABLE wa_entry_comments (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                entry_id  TEXT NOT NULL REFERENCES wa_entries(id) ON DELETE CASCADE,
                name      TEXT NOT NULL,
                text      TEXT NOT NULL,
                posted_at TEXT NOT NULL
            );

            CREATE INDEX idx_wa_entry_comments_entry ON wa_entry_comments(entry_id);

            CREATE TABLE media_messages (
                id         TEXT PRIMARY KEY,
                wa_number  TEXT NOT NULL,
                message    TEXT,
                media_type TEXT NOT NULL,
                media_url  TEXT NOT NULL,
                timestamp  TEXT NOT NULL,
                response   TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX idx_media_messages_wa ON media_messages(wa_number, timestamp);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

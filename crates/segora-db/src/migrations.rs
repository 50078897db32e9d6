use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE profiles (
                id                TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                email             TEXT,
                full_name         TEXT,
                campus            TEXT,
                major             TEXT,
                bio               TEXT,
                is_seller         INTEGER NOT NULL DEFAULT 0,
                shop_name         TEXT,
                shop_description  TEXT,
                avatar_url        TEXT
            );

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                icon        TEXT NOT NULL,
                color_bg    TEXT NOT NULL,
                color_text  TEXT NOT NULL
            );

            CREATE TABLE items (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                price           INTEGER NOT NULL CHECK (price >= 0),
                image_url       TEXT,
                category_id     TEXT NOT NULL REFERENCES categories(id),
                seller_id       TEXT NOT NULL REFERENCES users(id),
                seller_name     TEXT NOT NULL,
                seller_avatar   TEXT,
                seller_major    TEXT,
                campus          TEXT,
                offer_type      TEXT NOT NULL CHECK (offer_type IN ('product', 'service', 'request')),
                rating          REAL CHECK (rating IS NULL OR (rating >= 0 AND rating <= 5)),
                views           INTEGER NOT NULL DEFAULT 0 CHECK (views >= 0),
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_items_created ON items(created_at);
            CREATE INDEX idx_items_category ON items(category_id);
            CREATE INDEX idx_items_seller ON items(seller_id);
            CREATE INDEX idx_items_campus ON items(campus);

            -- user_lo/user_hi hold the participant pair in canonical order so the
            -- unique key covers both directions of the same pair.
            CREATE TABLE chats (
                id          TEXT PRIMARY KEY,
                user_a      TEXT NOT NULL,
                user_b      TEXT NOT NULL,
                user_lo     TEXT NOT NULL,
                user_hi     TEXT NOT NULL,
                item_id     TEXT NOT NULL,
                item_title  TEXT NOT NULL,
                item_image  TEXT,
                created_at  TEXT NOT NULL,
                CHECK (user_a <> user_b),
                CHECK (user_lo < user_hi),
                UNIQUE (user_lo, user_hi, item_id)
            );

            CREATE INDEX idx_chats_user_a ON chats(user_a);
            CREATE INDEX idx_chats_user_b ON chats(user_b);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                chat_id     TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                sender_id   TEXT NOT NULL,
                content     TEXT NOT NULL CHECK (length(trim(content)) > 0),
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_chat ON messages(chat_id, created_at);

            CREATE TABLE favorites (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                item_id     TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                UNIQUE (user_id, item_id)
            );

            CREATE TABLE transactions (
                id          TEXT PRIMARY KEY,
                item_id     TEXT NOT NULL,
                buyer_id    TEXT NOT NULL REFERENCES users(id),
                seller_id   TEXT NOT NULL,
                item_title  TEXT NOT NULL,
                item_image  TEXT,
                price       INTEGER NOT NULL CHECK (price >= 0),
                status      TEXT NOT NULL DEFAULT 'pending'
                            CHECK (status IN ('pending', 'completed', 'cancelled')),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_transactions_buyer ON transactions(buyer_id, created_at);

            CREATE TABLE reports (
                id           TEXT PRIMARY KEY,
                item_id      TEXT NOT NULL,
                reporter_id  TEXT NOT NULL REFERENCES users(id),
                rating       INTEGER NOT NULL DEFAULT 0 CHECK (rating >= 0 AND rating <= 5),
                review       TEXT,
                reason       TEXT,
                details      TEXT,
                created_at   TEXT NOT NULL
            );

            INSERT INTO categories (id, name, icon, color_bg, color_text) VALUES
                ('00000000-0000-0000-0000-000000000001', 'Elektronik', 'devices',    'bg-blue-100',   'text-blue-600'),
                ('00000000-0000-0000-0000-000000000002', 'Akademik',   'book',       'bg-amber-100',  'text-amber-600'),
                ('00000000-0000-0000-0000-000000000003', 'Fashion',    'checkroom',  'bg-pink-100',   'text-pink-600'),
                ('00000000-0000-0000-0000-000000000004', 'Makanan',    'restaurant', 'bg-orange-100', 'text-orange-600'),
                ('00000000-0000-0000-0000-000000000005', 'Jasa',       'print',      'bg-green-100',  'text-green-600');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (folded titles, rating averages)");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(
            "
            ALTER TABLE items ADD COLUMN title_folded TEXT NOT NULL DEFAULT '';
            CREATE INDEX idx_reports_item ON reports(item_id);
            ",
        )?;
        // SQLite only folds ASCII, so titles are lowercased here instead.
        let titles = {
            let mut stmt = tx.prepare("SELECT id, title FROM items")?;
            stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        for (id, title) in titles {
            tx.execute(
                "UPDATE items SET title_folded = ?1 WHERE id = ?2",
                [title.to_lowercase(), id],
            )?;
        }
        tx.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
        tx.commit()?;
    }

    info!("Database migrations complete");
    Ok(())
}

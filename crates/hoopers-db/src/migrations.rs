use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Applies pending schema migrations. Each version runs in a single batch
/// and records itself in `schema_version`.
///
/// Timestamps are TEXT columns always written from Rust so every value
/// shares one format and lexicographic order matches chronological order.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("running migration v1 (social core)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE profiles (
                id            TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                display_name  TEXT NOT NULL,
                bio           TEXT,
                position      TEXT,
                player_number INTEGER NOT NULL DEFAULT 0,
                points        INTEGER NOT NULL DEFAULT 0,
                city          TEXT,
                avatar_key    TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );

            CREATE TABLE follows (
                follower_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                followee_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            );
            CREATE INDEX idx_follows_followee ON follows(followee_id, created_at);

            CREATE TABLE posts (
                id         TEXT PRIMARY KEY,
                author_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                kind       TEXT NOT NULL,
                body       TEXT NOT NULL,
                media_key  TEXT,
                media_kind TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_posts_created ON posts(created_at, id);
            CREATE INDEX idx_posts_author ON posts(author_id, created_at);
            CREATE INDEX idx_posts_kind ON posts(kind, created_at);

            CREATE TABLE post_mentions (
                post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, profile_id)
            );
            CREATE INDEX idx_mentions_profile ON post_mentions(profile_id);

            CREATE TABLE post_comments (
                id         TEXT PRIMARY KEY,
                post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                body       TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_comments_post ON post_comments(post_id, created_at);

            CREATE TABLE post_likes (
                post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (post_id, profile_id)
            );

            CREATE TABLE post_ratings (
                post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                stars      INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
                created_at TEXT NOT NULL,
                PRIMARY KEY (post_id, profile_id)
            );

            CREATE TABLE courts (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                address    TEXT NOT NULL,
                city       TEXT NOT NULL,
                lat        REAL NOT NULL,
                lng        REAL NOT NULL,
                surface    TEXT,
                hoop_count INTEGER NOT NULL DEFAULT 2,
                indoor     INTEGER NOT NULL DEFAULT 0,
                created_by TEXT REFERENCES profiles(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_courts_city ON courts(city, name);

            CREATE TABLE runs (
                id           TEXT PRIMARY KEY,
                host_id      TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                court_id     TEXT NOT NULL REFERENCES courts(id),
                title        TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                status       TEXT NOT NULL DEFAULT 'scheduled',
                max_players  INTEGER NOT NULL,
                created_at   TEXT NOT NULL
            );
            CREATE INDEX idx_runs_sched ON runs(scheduled_at, id);
            CREATE INDEX idx_runs_host ON runs(host_id, scheduled_at);

            CREATE TABLE run_invites (
                run_id       TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                profile_id   TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                status       TEXT NOT NULL DEFAULT 'invited',
                invited_at   TEXT NOT NULL,
                responded_at TEXT,
                PRIMARY KEY (run_id, profile_id)
            );
            CREATE INDEX idx_run_invites_profile ON run_invites(profile_id, status);

            CREATE TABLE squads (
                id         TEXT PRIMARY KEY,
                owner_id   TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                name       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                motto      TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_squads_created ON squads(created_at, id);

            CREATE TABLE squad_members (
                squad_id   TEXT NOT NULL REFERENCES squads(id) ON DELETE CASCADE,
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                joined_at  TEXT NOT NULL,
                PRIMARY KEY (squad_id, profile_id)
            );
            CREATE INDEX idx_squad_members_profile ON squad_members(profile_id);

            CREATE TABLE games (
                id           TEXT PRIMARY KEY,
                run_id       TEXT REFERENCES runs(id) ON DELETE SET NULL,
                court_id     TEXT NOT NULL REFERENCES courts(id),
                recorded_by  TEXT REFERENCES profiles(id) ON DELETE SET NULL,
                played_at    TEXT NOT NULL,
                team_a_score INTEGER NOT NULL,
                team_b_score INTEGER NOT NULL,
                notes        TEXT,
                created_at   TEXT NOT NULL
            );
            CREATE INDEX idx_games_played ON games(played_at, id);

            CREATE TABLE game_players (
                game_id       TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
                profile_id    TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                team          TEXT NOT NULL,
                points_scored INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (game_id, profile_id)
            );
            CREATE INDEX idx_game_players_profile ON game_players(profile_id);

            CREATE TABLE scouting_reports (
                id          TEXT PRIMARY KEY,
                subject_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                scout_id    TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                shooting    INTEGER NOT NULL CHECK (shooting BETWEEN 1 AND 10),
                passing     INTEGER NOT NULL CHECK (passing BETWEEN 1 AND 10),
                defense     INTEGER NOT NULL CHECK (defense BETWEEN 1 AND 10),
                athleticism INTEGER NOT NULL CHECK (athleticism BETWEEN 1 AND 10),
                summary     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE (subject_id, scout_id)
            );
            CREATE INDEX idx_reports_subject ON scouting_reports(subject_id, created_at);

            CREATE TABLE notifications (
                id         TEXT PRIMARY KEY,
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                kind       TEXT NOT NULL,
                actor_id   TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                subject_id TEXT,
                read       INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_notifications_profile ON notifications(profile_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("running migration v2 (shop)");
        conn.execute_batch(
            "
            CREATE TABLE products (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                description TEXT NOT NULL,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                currency    TEXT NOT NULL,
                sku         TEXT NOT NULL UNIQUE,
                stock       INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                media_key   TEXT,
                active      INTEGER NOT NULL DEFAULT 1,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX idx_products_name ON products(name, id);
            CREATE INDEX idx_products_price ON products(price_cents, id);

            CREATE TABLE orders (
                id          TEXT PRIMARY KEY,
                profile_id  TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                status      TEXT NOT NULL DEFAULT 'pending',
                total_cents INTEGER NOT NULL,
                currency    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX idx_orders_profile ON orders(profile_id, created_at);

            CREATE TABLE order_items (
                order_id         TEXT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                product_id       TEXT NOT NULL REFERENCES products(id),
                quantity         INTEGER NOT NULL CHECK (quantity > 0),
                unit_price_cents INTEGER NOT NULL,
                PRIMARY KEY (order_id, product_id)
            );

            CREATE TABLE plan_subscriptions (
                id                 TEXT PRIMARY KEY,
                profile_id         TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                plan               TEXT NOT NULL,
                status             TEXT NOT NULL DEFAULT 'active',
                started_at         TEXT NOT NULL,
                current_period_end TEXT NOT NULL,
                cancelled_at       TEXT
            );
            CREATE INDEX idx_plan_subs_profile ON plan_subscriptions(profile_id, status);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("running migration v3 (push subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE push_subscriptions (
                profile_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                endpoint   TEXT NOT NULL,
                p256dh     TEXT NOT NULL,
                auth       TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (profile_id, endpoint)
            );

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    Ok(())
}

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Ordered schema steps. A step is applied once and recorded in
/// `schema_version`; never edit a step that has shipped, append a new one.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_ACCOUNTS), (2, V2_EVENTS), (3, V3_FEED)];

const V1_ACCOUNTS: &str = "
    CREATE TABLE casas (
        id               TEXT PRIMARY KEY,
        cidade           TEXT NOT NULL,
        estado           TEXT NOT NULL,
        endereco         TEXT,
        valor_aluguel    REAL,
        valor_total      REAL,
        quantidade_vagas INTEGER NOT NULL CHECK (quantidade_vagas > 0),
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    );

    CREATE TABLE users (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        email            TEXT NOT NULL UNIQUE,
        phone            TEXT NOT NULL UNIQUE,
        password         TEXT,
        is_active        INTEGER NOT NULL DEFAULT 0,
        activation_token TEXT UNIQUE,
        apelido          TEXT,
        periodo_ingresso TEXT,
        origem           TEXT,
        faculdade        TEXT CHECK (faculdade IN ('ufop', 'uemg')),
        curso            TEXT,
        hierarquia       TEXT CHECK (hierarquia IN ('calouro', 'morador', 'decano', 'ex-morador')),
        descricao        TEXT,
        linkfoto_perfil  TEXT,
        republic_id      TEXT REFERENCES republics(id) ON DELETE SET NULL,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    );

    CREATE INDEX idx_users_republic ON users(republic_id);

    CREATE TABLE republics (
        id                TEXT PRIMARY KEY,
        name              TEXT NOT NULL,
        address           TEXT NOT NULL,
        description       TEXT,
        link_foto         TEXT,
        tipo              TEXT CHECK (tipo IN ('masculina', 'feminina', 'mista')),
        fundada_em        TEXT,
        status            TEXT CHECK (status IN ('ativa', 'inativa', 'reformando', 'suspended')),
        foto_capa         TEXT,
        instagram         TEXT,
        hino              TEXT,
        link_estatuto_pdf TEXT,
        usuario_rumon_id  TEXT REFERENCES users(id) ON DELETE SET NULL,
        casa_id           TEXT REFERENCES casas(id) ON DELETE SET NULL,
        created_at        TEXT NOT NULL,
        updated_at        TEXT NOT NULL
    );

    CREATE TABLE user_social_media (
        id         TEXT PRIMARY KEY,
        user_id    TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        telefone   TEXT,
        whatsapp   TEXT,
        instagram  TEXT,
        linkedin   TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
";

const V2_EVENTS: &str = "
    CREATE TABLE event_types (
        id                TEXT PRIMARY KEY,
        name              TEXT NOT NULL UNIQUE,
        description       TEXT,
        color             TEXT,
        one_per_day       INTEGER NOT NULL DEFAULT 0,
        months_in_advance INTEGER,
        requires_approval INTEGER NOT NULL DEFAULT 0,
        created_at        TEXT NOT NULL,
        updated_at        TEXT NOT NULL
    );

    CREATE TABLE events (
        id               TEXT PRIMARY KEY,
        name             TEXT NOT NULL,
        description      TEXT,
        event_date       TEXT NOT NULL,
        event_time       TEXT NOT NULL,
        location         TEXT NOT NULL,
        media_url        TEXT,
        visibility       TEXT NOT NULL DEFAULT 'open' CHECK (visibility IN ('open', 'closed')),
        status           TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'approved', 'rejected')),
        rejection_reason TEXT,
        created_by_id    TEXT REFERENCES users(id) ON DELETE SET NULL,
        event_type_id    TEXT NOT NULL REFERENCES event_types(id) ON DELETE CASCADE,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL
    );

    CREATE INDEX idx_events_date ON events(event_date);
    CREATE INDEX idx_events_status ON events(status);
    CREATE INDEX idx_events_visibility ON events(visibility);
    CREATE INDEX idx_events_type_date ON events(event_type_id, event_date);

    CREATE TABLE event_republics (
        id          TEXT PRIMARY KEY,
        event_id    TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        republic_id TEXT NOT NULL REFERENCES republics(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL,
        UNIQUE(event_id, republic_id)
    );

    CREATE TABLE event_invites (
        id         TEXT PRIMARY KEY,
        event_id   TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
        user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status     TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted', 'declined')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(event_id, user_id)
    );

    CREATE INDEX idx_event_invites_user ON event_invites(user_id);

    -- Default event types
    INSERT INTO event_types (id, name, description, color, one_per_day, months_in_advance, requires_approval, created_at, updated_at)
    VALUES
        ('00000000-0000-0000-0000-000000000001', 'rock', 'Rock das repúblicas', '#E11D48', 1, 6, 1,
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        ('00000000-0000-0000-0000-000000000002', 'social', 'Encontro social', '#2563EB', 0, NULL, 0,
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        ('00000000-0000-0000-0000-000000000003', 'interreps', 'Evento entre repúblicas', '#16A34A', 0, NULL, 0,
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        ('00000000-0000-0000-0000-000000000004', 'festa', 'Festa', '#F59E0B', 0, NULL, 0,
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        ('00000000-0000-0000-0000-000000000005', 'cultural', 'Evento cultural', '#7C3AED', 0, NULL, 0,
            strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now'));
";

const V3_FEED: &str = "
    CREATE TABLE posts (
        id         TEXT PRIMARY KEY,
        type       TEXT NOT NULL CHECK (type IN ('text', 'image', 'video')),
        content    TEXT,
        media_url  TEXT,
        visibility TEXT NOT NULL CHECK (visibility IN ('all', 'republics', 'users')),
        author_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    );

    CREATE INDEX idx_posts_created ON posts(created_at);

    CREATE TABLE post_visible_republics (
        post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        republic_id TEXT NOT NULL REFERENCES republics(id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, republic_id)
    );

    CREATE TABLE post_visible_users (
        post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, user_id)
    );

    CREATE TABLE comments (
        id         TEXT PRIMARY KEY,
        post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        content    TEXT NOT NULL,
        emoticons  TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        deleted_at TEXT
    );

    CREATE INDEX idx_comments_post ON comments(post_id, created_at);

    CREATE TABLE post_likes (
        id         TEXT PRIMARY KEY,
        post_id    TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        UNIQUE(post_id, user_id)
    );

    CREATE TABLE comment_likes (
        id         TEXT PRIMARY KEY,
        comment_id TEXT NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
        user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        UNIQUE(comment_id, user_id)
    );
";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = current_version(conn)?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("migration v{} failed", version))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        tx.commit()?;
        info!("Applied migration v{}", version);
    }

    info!("Database migrations complete (schema v{})", current_version(conn)?);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), MIGRATIONS.len() as i64);
    }

    #[test]
    fn default_event_types_are_seeded() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        let (one_per_day, months, approval): (bool, Option<i64>, bool) = conn
            .query_row(
                "SELECT one_per_day, months_in_advance, requires_approval FROM event_types WHERE name = 'rock'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert!(one_per_day);
        assert_eq!(months, Some(6));
        assert!(approval);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM event_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 5);
    }
}

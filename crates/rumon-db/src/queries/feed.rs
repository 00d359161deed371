use anyhow::Result;
use rumon_types::models::{PostType, PostVisibility};
use rusqlite::{Connection, Row};

use super::{OptionalExt, new_id, now, parse_col, parse_opt_col, placeholders};
use crate::models::{CommentRow, LikeRow, PostRow};

// -- Posts --

const SELECT_POST: &str = "
    SELECT p.id, p.type, p.content, p.media_url, p.visibility,
           p.author_id, a.name, a.email, a.linkfoto_perfil,
           p.created_at, p.updated_at, p.deleted_at
    FROM posts p
    JOIN users a ON a.id = p.author_id";

fn map_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        post_type: parse_col(row, 1)?,
        content: row.get(2)?,
        media_url: row.get(3)?,
        visibility: parse_col(row, 4)?,
        author_id: row.get(5)?,
        author_name: row.get(6)?,
        author_email: row.get(7)?,
        author_linkfoto_perfil: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        deleted_at: row.get(11)?,
    })
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub post_type: PostType,
    pub content: Option<&'a str>,
    pub media_url: Option<&'a str>,
    pub visibility: PostVisibility,
    pub author_id: &'a str,
}

pub fn insert_post(conn: &Connection, new: &NewPost<'_>) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO posts (id, type, content, media_url, visibility, author_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        rusqlite::params![
            new.id,
            new.post_type.as_str(),
            new.content,
            new.media_url,
            new.visibility.as_str(),
            new.author_id,
            ts
        ],
    )?;
    Ok(())
}

pub fn add_visible_republic(conn: &Connection, post_id: &str, republic_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO post_visible_republics (post_id, republic_id) VALUES (?1, ?2)",
        [post_id, republic_id],
    )?;
    Ok(())
}

pub fn add_visible_user(conn: &Connection, post_id: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO post_visible_users (post_id, user_id) VALUES (?1, ?2)",
        [post_id, user_id],
    )?;
    Ok(())
}

/// Includes soft-deleted posts; callers check `deleted_at`.
pub fn find_post(conn: &Connection, id: &str) -> Result<Option<PostRow>> {
    let sql = format!("{} WHERE p.id = ?1", SELECT_POST);
    conn.query_row(&sql, [id], map_post).optional()
}

pub fn soft_delete_post(conn: &Connection, id: &str) -> Result<usize> {
    let ts = now();
    let changed = conn.execute(
        "UPDATE posts SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        rusqlite::params![ts, id],
    )?;
    Ok(changed)
}

/// Posts `viewer_id` may see, newest first: public ones, ones addressed to
/// the viewer, ones addressed to the viewer's república, and their own.
/// `before` is an exclusive `created_at` cursor.
pub fn feed_for(
    conn: &Connection,
    viewer_id: &str,
    limit: u32,
    before: Option<&str>,
) -> Result<Vec<PostRow>> {
    let sql = format!(
        "{} WHERE p.deleted_at IS NULL
              AND (?2 IS NULL OR p.created_at < ?2)
              AND (p.visibility = 'all'
                   OR p.author_id = ?1
                   OR (p.visibility = 'users' AND EXISTS (
                        SELECT 1 FROM post_visible_users pu
                        WHERE pu.post_id = p.id AND pu.user_id = ?1))
                   OR (p.visibility = 'republics' AND EXISTS (
                        SELECT 1 FROM post_visible_republics pr
                        JOIN users v ON v.republic_id = pr.republic_id
                        WHERE pr.post_id = p.id AND v.id = ?1)))
            ORDER BY p.created_at DESC, p.rowid DESC
            LIMIT ?3",
        SELECT_POST
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![viewer_id, before, limit], map_post)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Comments --

const SELECT_COMMENT: &str = "
    SELECT c.id, c.post_id, c.content, c.emoticons,
           a.id, a.name, a.email, a.linkfoto_perfil, a.periodo_ingresso, a.hierarquia,
           r.id, r.name,
           c.created_at, c.deleted_at
    FROM comments c
    JOIN users a ON a.id = c.author_id
    LEFT JOIN republics r ON r.id = a.republic_id";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        emoticons: row.get(3)?,
        author_id: row.get(4)?,
        author_name: row.get(5)?,
        author_email: row.get(6)?,
        author_linkfoto_perfil: row.get(7)?,
        author_periodo_ingresso: row.get(8)?,
        author_hierarquia: parse_opt_col(row, 9)?,
        author_republic_id: row.get(10)?,
        author_republic_name: row.get(11)?,
        created_at: row.get(12)?,
        deleted_at: row.get(13)?,
    })
}

pub fn insert_comment(
    conn: &Connection,
    id: &str,
    post_id: &str,
    author_id: &str,
    content: &str,
    emoticons_json: &str,
) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO comments (id, post_id, author_id, content, emoticons, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        rusqlite::params![id, post_id, author_id, content, emoticons_json, ts],
    )?;
    Ok(())
}

/// Includes soft-deleted comments; callers check `deleted_at`.
pub fn find_comment(conn: &Connection, id: &str) -> Result<Option<CommentRow>> {
    let sql = format!("{} WHERE c.id = ?1", SELECT_COMMENT);
    conn.query_row(&sql, [id], map_comment).optional()
}

pub fn soft_delete_comment(conn: &Connection, id: &str) -> Result<usize> {
    let ts = now();
    let changed = conn.execute(
        "UPDATE comments SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
        rusqlite::params![ts, id],
    )?;
    Ok(changed)
}

/// Live comments of the given posts, oldest first.
pub fn comments_for_posts(conn: &Connection, post_ids: &[String]) -> Result<Vec<CommentRow>> {
    if post_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "{} WHERE c.post_id IN ({}) AND c.deleted_at IS NULL
            ORDER BY c.created_at, c.rowid",
        SELECT_COMMENT,
        placeholders(post_ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(post_ids), map_comment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Likes --

#[derive(Clone, Copy)]
pub enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    fn table(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes",
            LikeTarget::Comment => "comment_likes",
        }
    }

    fn column(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_id",
            LikeTarget::Comment => "comment_id",
        }
    }
}

/// Toggle a like: removes if exists, inserts if not.
/// Returns true when the like is now present.
pub fn toggle_like(
    conn: &Connection,
    target: LikeTarget,
    target_id: &str,
    user_id: &str,
) -> Result<bool> {
    let (table, column) = (target.table(), target.column());

    let existing: Option<String> = conn
        .query_row(
            &format!("SELECT id FROM {} WHERE {} = ?1 AND user_id = ?2", table, column),
            [target_id, user_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_id) = existing {
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [&existing_id])?;
        Ok(false)
    } else {
        conn.execute(
            &format!(
                "INSERT INTO {} (id, {}, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                table, column
            ),
            rusqlite::params![new_id(), target_id, user_id, now()],
        )?;
        Ok(true)
    }
}

/// Batch-fetch likes for a set of posts or comments.
pub fn likes_for(conn: &Connection, target: LikeTarget, target_ids: &[String]) -> Result<Vec<LikeRow>> {
    if target_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {col}, user_id FROM {table} WHERE {col} IN ({})",
        placeholders(target_ids.len()),
        col = target.column(),
        table = target.table(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(target_ids), |row| {
            Ok(LikeRow {
                target_id: row.get(0)?,
                user_id: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::{republics, users};

    fn post<'a>(id: &'a str, author: &'a str, visibility: PostVisibility) -> NewPost<'a> {
        NewPost {
            id,
            post_type: PostType::Text,
            content: Some("olá"),
            media_url: None,
            visibility,
            author_id: author,
        }
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            users::insert_pending(conn, "author", "Autor", "a@x.com", "31999990001", "t1")?;
            users::insert_pending(conn, "member", "Membro", "m@x.com", "31999990002", "t2")?;
            users::insert_pending(conn, "target", "Alvo", "t@x.com", "31999990003", "t3")?;
            users::insert_pending(conn, "stranger", "Outro", "s@x.com", "31999990004", "t4")?;
            republics::insert(conn, "r1", "Rep", "Rua A", None)?;
            users::set_republic(conn, "member", Some("r1"))?;
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
        db
    }

    fn feed_ids(conn: &Connection, viewer: &str) -> Vec<String> {
        feed_for(conn, viewer, 50, None)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    #[test]
    fn feed_unions_visibility_scopes() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_post(conn, &post("public", "author", PostVisibility::All))?;
            insert_post(conn, &post("to-rep", "author", PostVisibility::Republics))?;
            add_visible_republic(conn, "to-rep", "r1")?;
            insert_post(conn, &post("to-user", "author", PostVisibility::Users))?;
            add_visible_user(conn, "to-user", "target")?;

            let mut member = feed_ids(conn, "member");
            member.sort();
            assert_eq!(member, vec!["public", "to-rep"]);

            let mut target = feed_ids(conn, "target");
            target.sort();
            assert_eq!(target, vec!["public", "to-user"]);

            assert_eq!(feed_ids(conn, "stranger"), vec!["public"]);
            assert_eq!(feed_ids(conn, "author").len(), 3);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn soft_deleted_post_leaves_feed_but_stays_stored() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_post(conn, &post("p1", "author", PostVisibility::All))?;
            assert_eq!(soft_delete_post(conn, "p1")?, 1);
            assert_eq!(soft_delete_post(conn, "p1")?, 0);

            assert!(feed_ids(conn, "stranger").is_empty());
            assert!(find_post(conn, "p1")?.unwrap().deleted_at.is_some());
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn toggling_twice_restores_unliked() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_post(conn, &post("p1", "author", PostVisibility::All))?;
            assert!(toggle_like(conn, LikeTarget::Post, "p1", "member")?);
            assert_eq!(likes_for(conn, LikeTarget::Post, &["p1".to_string()])?.len(), 1);
            assert!(!toggle_like(conn, LikeTarget::Post, "p1", "member")?);
            assert!(likes_for(conn, LikeTarget::Post, &["p1".to_string()])?.is_empty());
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn comments_carry_author_republic() {
        let db = seeded();
        db.with_conn(|conn| {
            insert_post(conn, &post("p1", "author", PostVisibility::All))?;
            insert_comment(conn, "c1", "p1", "member", "boa", "{}")?;
            insert_comment(conn, "c2", "p1", "stranger", "apagado", "{}")?;
            soft_delete_comment(conn, "c2")?;

            let comments = comments_for_posts(conn, &["p1".to_string()])?;
            assert_eq!(comments.len(), 1);
            assert_eq!(comments[0].author_republic_name.as_deref(), Some("Rep"));
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }
}

use anyhow::Result;
use rusqlite::{Connection, Row};

use super::{OptionalExt, new_id, now, parse_opt_col};
use crate::models::{SocialMediaRow, UserRefRow, UserRow};

const SELECT_USER: &str = "
    SELECT u.id, u.name, u.email, u.phone, u.password, u.is_active, u.apelido,
           u.periodo_ingresso, u.origem, u.faculdade, u.curso, u.hierarquia,
           u.descricao, u.linkfoto_perfil, u.republic_id, r.name,
           u.created_at, u.updated_at
    FROM users u
    LEFT JOIN republics r ON r.id = u.republic_id";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password: row.get(4)?,
        is_active: row.get(5)?,
        apelido: row.get(6)?,
        periodo_ingresso: row.get(7)?,
        origem: row.get(8)?,
        faculdade: parse_opt_col(row, 9)?,
        curso: row.get(10)?,
        hierarquia: parse_opt_col(row, 11)?,
        descricao: row.get(12)?,
        linkfoto_perfil: row.get(13)?,
        republic_id: row.get(14)?,
        republic_name: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

/// Read a LEFT JOINed user reference starting at column `idx`
/// (id, name, apelido, linkfoto_perfil). `None` when the join found nothing.
pub(crate) fn user_ref_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<UserRefRow>> {
    let id: Option<String> = row.get(idx)?;
    match id {
        Some(id) => Ok(Some(UserRefRow {
            id,
            name: row.get(idx + 1)?,
            apelido: row.get(idx + 2)?,
            linkfoto_perfil: row.get(idx + 3)?,
        })),
        None => Ok(None),
    }
}

/// Create an inactive account awaiting its password.
pub fn insert_pending(
    conn: &Connection,
    id: &str,
    name: &str,
    email: &str,
    phone: &str,
    activation_token: &str,
) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO users (id, name, email, phone, is_active, activation_token, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)",
        rusqlite::params![id, name, email, phone, activation_token, ts],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("{} WHERE u.id = ?1", SELECT_USER);
    conn.query_row(&sql, [id], map_user).optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let sql = format!("{} WHERE u.email = ?1", SELECT_USER);
    conn.query_row(&sql, [email], map_user).optional()
}

pub fn find_id_by_activation_token(conn: &Connection, token: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT id FROM users WHERE activation_token = ?1",
        [token],
        |row| row.get(0),
    )
    .optional()
}

pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn phone_exists(conn: &Connection, phone: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE phone = ?1", [phone], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Store the password hash, clear the token and activate the account.
pub fn activate(conn: &Connection, id: &str, password_hash: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE users
         SET password = ?1, is_active = 1, activation_token = NULL, updated_at = ?2
         WHERE id = ?3",
        rusqlite::params![password_hash, now(), id],
    )?;
    Ok(changed)
}

/// Join or leave a república. `None` clears the membership.
pub fn set_republic(conn: &Connection, id: &str, republic_id: Option<&str>) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE users SET republic_id = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![republic_id, now(), id],
    )?;
    Ok(changed)
}

// -- Social media --

pub struct SocialMediaFields<'a> {
    pub telefone: Option<&'a str>,
    pub whatsapp: Option<&'a str>,
    pub instagram: Option<&'a str>,
    pub linkedin: Option<&'a str>,
}

pub fn find_social_media(conn: &Connection, user_id: &str) -> Result<Option<SocialMediaRow>> {
    conn.query_row(
        "SELECT id, user_id, telefone, whatsapp, instagram, linkedin, created_at, updated_at
         FROM user_social_media WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(SocialMediaRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                telefone: row.get(2)?,
                whatsapp: row.get(3)?,
                instagram: row.get(4)?,
                linkedin: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
            })
        },
    )
    .optional()
}

/// Insert the user's social-media row, or overwrite every field of the
/// existing one.
pub fn upsert_social_media(
    conn: &Connection,
    user_id: &str,
    fields: &SocialMediaFields<'_>,
) -> Result<SocialMediaRow> {
    let ts = now();
    conn.execute(
        "INSERT INTO user_social_media (id, user_id, telefone, whatsapp, instagram, linkedin, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(user_id) DO UPDATE SET
            telefone = excluded.telefone,
            whatsapp = excluded.whatsapp,
            instagram = excluded.instagram,
            linkedin = excluded.linkedin,
            updated_at = excluded.updated_at",
        rusqlite::params![
            new_id(),
            user_id,
            fields.telefone,
            fields.whatsapp,
            fields.instagram,
            fields.linkedin,
            ts
        ],
    )?;

    find_social_media(conn, user_id)?
        .ok_or_else(|| anyhow::anyhow!("social media row vanished for user {}", user_id))
}

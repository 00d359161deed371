use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

use super::{OptionalExt, new_id, now, parse_opt_col};
use crate::models::{CasaRow, MemberRow, RepublicRow};

const SELECT_REPUBLIC: &str = "
    SELECT id, name, address, description, link_foto, tipo, fundada_em, status,
           foto_capa, instagram, hino, link_estatuto_pdf, usuario_rumon_id, casa_id,
           created_at, updated_at
    FROM republics";

fn map_republic(row: &Row<'_>) -> rusqlite::Result<RepublicRow> {
    Ok(RepublicRow {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        description: row.get(3)?,
        link_foto: row.get(4)?,
        tipo: parse_opt_col(row, 5)?,
        fundada_em: row.get(6)?,
        status: parse_opt_col(row, 7)?,
        foto_capa: row.get(8)?,
        instagram: row.get(9)?,
        hino: row.get(10)?,
        link_estatuto_pdf: row.get(11)?,
        usuario_rumon_id: row.get(12)?,
        casa_id: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub fn insert(
    conn: &Connection,
    id: &str,
    name: &str,
    address: &str,
    description: Option<&str>,
) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO republics (id, name, address, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![id, name, address, description, ts],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<RepublicRow>> {
    let sql = format!("{} WHERE id = ?1", SELECT_REPUBLIC);
    conn.query_row(&sql, [id], map_republic).optional()
}

pub fn list(conn: &Connection) -> Result<Vec<RepublicRow>> {
    let sql = format!("{} ORDER BY name", SELECT_REPUBLIC);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_republic)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM republics WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn delete(conn: &Connection, id: &str) -> Result<usize> {
    let changed = conn.execute("DELETE FROM republics WHERE id = ?1", [id])?;
    Ok(changed)
}

/// Current members, by name.
pub fn members(conn: &Connection, republic_id: &str) -> Result<Vec<MemberRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, linkfoto_perfil FROM users WHERE republic_id = ?1 ORDER BY name, id",
    )?;
    let rows = stmt
        .query_map([republic_id], |row| {
            Ok(MemberRow {
                id: row.get(0)?,
                name: row.get(1)?,
                linkfoto_perfil: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Member ids in a stable order (join order), used to expand republic invites.
pub fn member_ids(conn: &Connection, republic_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM users WHERE republic_id = ?1 ORDER BY created_at, id")?;
    let ids = stmt
        .query_map([republic_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(ids)
}

// -- Casa --

pub struct CasaFields<'a> {
    pub cidade: &'a str,
    pub estado: &'a str,
    pub endereco: Option<&'a str>,
    pub valor_aluguel: Option<f64>,
    pub valor_total: Option<f64>,
    pub quantidade_vagas: i64,
}

pub fn find_casa(conn: &Connection, casa_id: &str) -> Result<Option<CasaRow>> {
    conn.query_row(
        "SELECT id, cidade, estado, endereco, valor_aluguel, valor_total, quantidade_vagas,
                created_at, updated_at
         FROM casas WHERE id = ?1",
        [casa_id],
        |row| {
            Ok(CasaRow {
                id: row.get(0)?,
                cidade: row.get(1)?,
                estado: row.get(2)?,
                endereco: row.get(3)?,
                valor_aluguel: row.get(4)?,
                valor_total: row.get(5)?,
                quantidade_vagas: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        },
    )
    .optional()
}

/// Point the república at a fresh casa row and drop the one it replaces.
/// Run inside a transaction.
pub fn replace_casa(
    conn: &Connection,
    republic_id: &str,
    fields: &CasaFields<'_>,
) -> Result<CasaRow> {
    let previous: Option<Option<String>> = conn
        .query_row(
            "SELECT casa_id FROM republics WHERE id = ?1",
            [republic_id],
            |row| row.get(0),
        )
        .optional()?;
    let previous = previous.ok_or_else(|| anyhow!("republic {} not found", republic_id))?;

    let id = new_id();
    let ts = now();
    conn.execute(
        "INSERT INTO casas (id, cidade, estado, endereco, valor_aluguel, valor_total, quantidade_vagas, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        rusqlite::params![
            id,
            fields.cidade,
            fields.estado,
            fields.endereco,
            fields.valor_aluguel,
            fields.valor_total,
            fields.quantidade_vagas,
            ts
        ],
    )?;
    conn.execute(
        "UPDATE republics SET casa_id = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![id, ts, republic_id],
    )?;

    if let Some(old) = previous {
        conn.execute("DELETE FROM casas WHERE id = ?1", [&old])?;
    }

    find_casa(conn, &id)?.ok_or_else(|| anyhow!("casa {} vanished after insert", id))
}

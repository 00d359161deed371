use anyhow::Result;
use rumon_types::models::InviteStatus;
use rusqlite::{Connection, Row};

use super::users::user_ref_at;
use super::{OptionalExt, now, parse_col};
use crate::models::InviteRow;

const SELECT_INVITE: &str = "
    SELECT i.id, i.event_id, i.user_id, i.status,
           u.id, u.name, u.apelido, u.linkfoto_perfil,
           i.created_at, i.updated_at
    FROM event_invites i
    LEFT JOIN users u ON u.id = i.user_id";

fn map_invite(row: &Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        user_id: row.get(2)?,
        status: parse_col(row, 3)?,
        user: user_ref_at(row, 4)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// New invites start out pending. Fails with a UNIQUE violation when the user
/// is already invited.
pub fn insert(conn: &Connection, id: &str, event_id: &str, user_id: &str) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO event_invites (id, event_id, user_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
        rusqlite::params![id, event_id, user_id, ts],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<InviteRow>> {
    let sql = format!("{} WHERE i.id = ?1", SELECT_INVITE);
    conn.query_row(&sql, [id], map_invite).optional()
}

pub fn find(conn: &Connection, event_id: &str, user_id: &str) -> Result<Option<InviteRow>> {
    let sql = format!("{} WHERE i.event_id = ?1 AND i.user_id = ?2", SELECT_INVITE);
    conn.query_row(&sql, [event_id, user_id], map_invite).optional()
}

pub fn for_event(conn: &Connection, event_id: &str) -> Result<Vec<InviteRow>> {
    let sql = format!("{} WHERE i.event_id = ?1 ORDER BY i.created_at", SELECT_INVITE);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([event_id], map_invite)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Newest first.
pub fn for_user(conn: &Connection, user_id: &str) -> Result<Vec<InviteRow>> {
    let sql = format!(
        "{} WHERE i.user_id = ?1 ORDER BY i.created_at DESC, i.rowid DESC",
        SELECT_INVITE
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], map_invite)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_status(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
    status: InviteStatus,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE event_invites SET status = ?1, updated_at = ?2 WHERE event_id = ?3 AND user_id = ?4",
        rusqlite::params![status.as_str(), now(), event_id, user_id],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::constraint::{ConstraintViolation, classify};
    use crate::queries::{events, users};
    use rumon_types::models::{EventStatus, EventVisibility};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            users::insert_pending(conn, "u1", "Ana", "a@x.com", "31999990001", "t1")?;
            events::insert(
                conn,
                &events::NewEvent {
                    id: "e1",
                    name: "Sarau",
                    description: None,
                    event_date: "2025-05-10",
                    event_time: "19:00",
                    location: "Casa",
                    media_url: None,
                    visibility: EventVisibility::Closed,
                    status: EventStatus::Approved,
                    created_by_id: "u1",
                    event_type_id: "00000000-0000-0000-0000-000000000005",
                },
            )
        })
        .unwrap();
        db
    }

    #[test]
    fn duplicate_invite_is_a_unique_violation() {
        let db = seeded();
        db.with_conn(|conn| insert(conn, "i1", "e1", "u1")).unwrap();

        let err = db.with_conn(|conn| insert(conn, "i2", "e1", "u1")).unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(ConstraintViolation::Unique { ref table, .. }) if table == "event_invites"
        ));
    }

    #[test]
    fn status_update_targets_event_and_user() {
        let db = seeded();
        db.with_conn(|conn| {
            insert(conn, "i1", "e1", "u1")?;
            assert_eq!(set_status(conn, "e1", "u1", InviteStatus::Declined)?, 1);
            assert_eq!(set_status(conn, "e1", "nobody", InviteStatus::Declined)?, 0);

            let invite = find(conn, "e1", "u1")?.unwrap();
            assert_eq!(invite.status, InviteStatus::Declined);
            assert_eq!(invite.user.map(|u| u.name), Some("Ana".to_string()));
            assert_eq!(for_user(conn, "u1")?.len(), 1);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }
}

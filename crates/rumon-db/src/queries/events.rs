use anyhow::Result;
use rumon_types::models::{EventStatus, EventVisibility};
use rusqlite::{Connection, Row};

use super::users::user_ref_at;
use super::{OptionalExt, new_id, now, parse_col, placeholders};
use crate::models::{EventRepublicRow, EventRow, EventTypeRow};

// -- Event types --

const SELECT_TYPE: &str = "
    SELECT id, name, description, color, one_per_day, months_in_advance,
           requires_approval, created_at, updated_at
    FROM event_types";

fn map_type(row: &Row<'_>) -> rusqlite::Result<EventTypeRow> {
    Ok(EventTypeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        one_per_day: row.get(4)?,
        months_in_advance: row.get(5)?,
        requires_approval: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub struct NewEventType<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub color: Option<&'a str>,
    pub one_per_day: bool,
    pub months_in_advance: Option<u32>,
    pub requires_approval: bool,
}

pub fn insert_type(conn: &Connection, id: &str, new: &NewEventType<'_>) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO event_types (id, name, description, color, one_per_day, months_in_advance, requires_approval, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        rusqlite::params![
            id,
            new.name,
            new.description,
            new.color,
            new.one_per_day,
            new.months_in_advance,
            new.requires_approval,
            ts
        ],
    )?;
    Ok(())
}

pub fn find_type(conn: &Connection, id: &str) -> Result<Option<EventTypeRow>> {
    let sql = format!("{} WHERE id = ?1", SELECT_TYPE);
    conn.query_row(&sql, [id], map_type).optional()
}

pub fn list_types(conn: &Connection) -> Result<Vec<EventTypeRow>> {
    let sql = format!("{} ORDER BY name", SELECT_TYPE);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_type)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_type(conn: &Connection, id: &str) -> Result<usize> {
    let changed = conn.execute("DELETE FROM event_types WHERE id = ?1", [id])?;
    Ok(changed)
}

// -- Events --

const SELECT_EVENT: &str = "
    SELECT e.id, e.name, e.description, e.event_date, e.event_time, e.location,
           e.media_url, e.visibility, e.status, e.rejection_reason,
           e.event_type_id, t.name, t.color,
           c.id, c.name, c.apelido, c.linkfoto_perfil,
           e.created_at, e.updated_at
    FROM events e
    JOIN event_types t ON t.id = e.event_type_id
    LEFT JOIN users c ON c.id = e.created_by_id";

const ORDER_BY_DATE: &str = " ORDER BY e.event_date, e.event_time, e.created_at";

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        event_date: row.get(3)?,
        event_time: row.get(4)?,
        location: row.get(5)?,
        media_url: row.get(6)?,
        visibility: parse_col(row, 7)?,
        status: parse_col(row, 8)?,
        rejection_reason: row.get(9)?,
        event_type_id: row.get(10)?,
        event_type_name: row.get(11)?,
        event_type_color: row.get(12)?,
        created_by: user_ref_at(row, 13)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

fn query_events(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<EventRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_event)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct NewEvent<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub event_date: &'a str,
    pub event_time: &'a str,
    pub location: &'a str,
    pub media_url: Option<&'a str>,
    pub visibility: EventVisibility,
    pub status: EventStatus,
    pub created_by_id: &'a str,
    pub event_type_id: &'a str,
}

pub fn insert(conn: &Connection, new: &NewEvent<'_>) -> Result<()> {
    let ts = now();
    conn.execute(
        "INSERT INTO events (id, name, description, event_date, event_time, location, media_url,
                             visibility, status, created_by_id, event_type_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        rusqlite::params![
            new.id,
            new.name,
            new.description,
            new.event_date,
            new.event_time,
            new.location,
            new.media_url,
            new.visibility.as_str(),
            new.status.as_str(),
            new.created_by_id,
            new.event_type_id,
            ts
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<EventRow>> {
    let sql = format!("{} WHERE e.id = ?1", SELECT_EVENT);
    conn.query_row(&sql, [id], map_event).optional()
}

pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM events WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn list_all(conn: &Connection) -> Result<Vec<EventRow>> {
    query_events(conn, &format!("{}{}", SELECT_EVENT, ORDER_BY_DATE), [])
}

/// Open and approved.
pub fn list_public(conn: &Connection) -> Result<Vec<EventRow>> {
    let sql = format!(
        "{} WHERE e.visibility = 'open' AND e.status = 'approved'{}",
        SELECT_EVENT, ORDER_BY_DATE
    );
    query_events(conn, &sql, [])
}

/// Events the república organizes.
pub fn list_by_republic(conn: &Connection, republic_id: &str) -> Result<Vec<EventRow>> {
    let sql = format!(
        "{} WHERE EXISTS (SELECT 1 FROM event_republics er
                          WHERE er.event_id = e.id AND er.republic_id = ?1){}",
        SELECT_EVENT, ORDER_BY_DATE
    );
    query_events(conn, &sql, [republic_id])
}

pub fn list_by_creator(conn: &Connection, user_id: &str) -> Result<Vec<EventRow>> {
    let sql = format!("{} WHERE e.created_by_id = ?1{}", SELECT_EVENT, ORDER_BY_DATE);
    query_events(conn, &sql, [user_id])
}

/// Events dated in `[from, until)` that `user_id` may see: approved or
/// pending, and either open or carrying an accepted invite for the user.
pub fn list_visible(
    conn: &Connection,
    user_id: &str,
    from: &str,
    until: &str,
) -> Result<Vec<EventRow>> {
    let sql = format!(
        "{} WHERE e.event_date >= ?2 AND e.event_date < ?3
              AND e.status IN ('approved', 'pending')
              AND (e.visibility = 'open'
                   OR EXISTS (SELECT 1 FROM event_invites i
                              WHERE i.event_id = e.id AND i.user_id = ?1
                                AND i.status = 'accepted'))
            ORDER BY e.event_date, e.event_time",
        SELECT_EVENT
    );
    query_events(conn, &sql, rusqlite::params![user_id, from, until])
}

/// Whether a non-rejected event of `event_type_id` already sits on `date`.
/// `exclude_id` skips the event being edited.
pub fn date_taken(
    conn: &Connection,
    event_type_id: &str,
    date: &str,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM events
             WHERE event_type_id = ?1 AND event_date = ?2 AND status != 'rejected'
               AND (?3 IS NULL OR id != ?3)
             LIMIT 1",
            rusqlite::params![event_type_id, date, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn set_status(
    conn: &Connection,
    id: &str,
    status: EventStatus,
    rejection_reason: Option<&str>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE events SET status = ?1, rejection_reason = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![status.as_str(), rejection_reason, now(), id],
    )?;
    Ok(changed)
}

pub fn delete(conn: &Connection, id: &str) -> Result<usize> {
    let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
    Ok(changed)
}

// -- Organizers --

pub fn add_republic(conn: &Connection, event_id: &str, republic_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO event_republics (id, event_id, republic_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![new_id(), event_id, republic_id, now()],
    )?;
    Ok(())
}

/// Batch-fetch organizing repúblicas for a set of events.
pub fn republics_for_events(conn: &Connection, event_ids: &[String]) -> Result<Vec<EventRepublicRow>> {
    if event_ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT er.id, er.event_id, er.republic_id, r.name, r.link_foto
         FROM event_republics er
         JOIN republics r ON r.id = er.republic_id
         WHERE er.event_id IN ({})
         ORDER BY er.created_at, r.name",
        placeholders(event_ids.len())
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(event_ids), |row| {
            Ok(EventRepublicRow {
                id: row.get(0)?,
                event_id: row.get(1)?,
                republic_id: row.get(2)?,
                republic_name: row.get(3)?,
                republic_link_foto: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::queries::{invites, republics, users};
    use rumon_types::models::InviteStatus;

    const SOCIAL: &str = "00000000-0000-0000-0000-000000000002";

    fn event<'a>(id: &'a str, date: &'a str, visibility: EventVisibility, status: EventStatus) -> NewEvent<'a> {
        NewEvent {
            id,
            name: id,
            description: None,
            event_date: date,
            event_time: "20:00",
            location: "Praça Tiradentes",
            media_url: None,
            visibility,
            status,
            created_by_id: "u1",
            event_type_id: SOCIAL,
        }
    }

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            users::insert_pending(conn, "u1", "Ana", "a@x.com", "31999990001", "t1")?;
            users::insert_pending(conn, "u2", "Bia", "b@x.com", "31999990002", "t2")?;
            republics::insert(conn, "r1", "Rep", "Rua A", None)
        })
        .unwrap();
        db
    }

    #[test]
    fn visible_month_filters_date_status_and_invites() {
        use EventStatus::*;
        use EventVisibility::*;

        let db = seeded();
        db.with_conn(|conn| {
            insert(conn, &event("open-approved", "2024-12-05", Open, Approved))?;
            insert(conn, &event("open-pending", "2024-12-01", Open, Pending))?;
            insert(conn, &event("open-rejected", "2024-12-06", Open, Rejected))?;
            insert(conn, &event("closed-accepted", "2024-12-31", Closed, Approved))?;
            insert(conn, &event("closed-pending-invite", "2024-12-10", Closed, Approved))?;
            insert(conn, &event("closed-other-user", "2024-12-11", Closed, Approved))?;
            insert(conn, &event("next-month", "2025-01-01", Open, Approved))?;
            insert(conn, &event("prev-month", "2024-11-30", Open, Approved))?;

            invites::insert(conn, "i1", "closed-accepted", "u2")?;
            invites::set_status(conn, "closed-accepted", "u2", InviteStatus::Accepted)?;
            invites::insert(conn, "i2", "closed-pending-invite", "u2")?;
            invites::insert(conn, "i3", "closed-other-user", "u1")?;
            invites::set_status(conn, "closed-other-user", "u1", InviteStatus::Accepted)?;

            let ids: Vec<String> = list_visible(conn, "u2", "2024-12-01", "2025-01-01")?
                .into_iter()
                .map(|e| e.id)
                .collect();
            assert_eq!(ids, vec!["open-pending", "open-approved", "closed-accepted"]);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn rejected_events_do_not_take_the_date() {
        let db = seeded();
        db.with_conn(|conn| {
            insert(conn, &event("e1", "2025-03-01", EventVisibility::Open, EventStatus::Rejected))?;
            assert!(!date_taken(conn, SOCIAL, "2025-03-01", None)?);

            insert(conn, &event("e2", "2025-03-01", EventVisibility::Open, EventStatus::Pending))?;
            assert!(date_taken(conn, SOCIAL, "2025-03-01", None)?);
            assert!(!date_taken(conn, SOCIAL, "2025-03-01", Some("e2"))?);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn organizers_are_unique_and_cascade() {
        let db = seeded();
        db.with_conn(|conn| {
            insert(conn, &event("e1", "2025-03-01", EventVisibility::Open, EventStatus::Approved))?;
            add_republic(conn, "e1", "r1")?;
            assert!(add_republic(conn, "e1", "r1").is_err());

            let links = republics_for_events(conn, &["e1".to_string()])?;
            assert_eq!(links.len(), 1);
            assert_eq!(links[0].republic_name, "Rep");
            assert_eq!(list_by_republic(conn, "r1")?.len(), 1);

            delete(conn, "e1")?;
            assert!(republics_for_events(conn, &["e1".to_string()])?.is_empty());
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }

    #[test]
    fn event_row_joins_type_and_creator() {
        let db = seeded();
        db.with_conn(|conn| {
            insert(conn, &event("e1", "2025-03-01", EventVisibility::Open, EventStatus::Approved))?;
            let row = find_by_id(conn, "e1")?.unwrap();
            assert_eq!(row.event_type_name, "social");
            assert_eq!(row.created_by.map(|c| c.name), Some("Ana".to_string()));
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
    }
}

use rusqlite::ffi;

/// A SQLite constraint failure, decoded from the driver error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// UNIQUE or PRIMARY KEY. `table`/`column` name the first offending column.
    Unique { table: String, column: String },
    ForeignKey,
    Other,
}

/// Walk the error chain looking for a rusqlite constraint failure.
pub fn classify(err: &anyhow::Error) -> Option<ConstraintViolation> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<rusqlite::Error>())
        .and_then(classify_sqlite)
}

fn classify_sqlite(err: &rusqlite::Error) -> Option<ConstraintViolation> {
    let rusqlite::Error::SqliteFailure(code, message) = err else {
        return None;
    };
    if code.code != rusqlite::ErrorCode::ConstraintViolation {
        return None;
    }

    match code.extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            let (table, column) = message
                .as_deref()
                .and_then(parse_unique_target)
                .unwrap_or_default();
            Some(ConstraintViolation::Unique { table, column })
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintViolation::ForeignKey),
        _ => Some(ConstraintViolation::Other),
    }
}

/// "UNIQUE constraint failed: users.email" -> ("users", "email").
/// Composite keys list several columns; only the first is kept.
fn parse_unique_target(message: &str) -> Option<(String, String)> {
    let target = message.split_once("failed:")?.1.trim();
    let first = target.split(',').next()?.trim();
    let (table, column) = first.split_once('.')?;
    Some((table.to_string(), column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn insert_user(db: &Database, id: &str, email: &str, phone: &str) -> anyhow::Result<()> {
        db.with_conn(|conn| {
            crate::queries::users::insert_pending(conn, id, "Fulano", email, phone, &format!("tok-{id}"))
        })
    }

    #[test]
    fn duplicate_email_is_unique_on_users_email() {
        let db = Database::open_in_memory().unwrap();
        insert_user(&db, "u1", "a@b.com", "31999990000").unwrap();

        let err = insert_user(&db, "u2", "a@b.com", "31999990001").unwrap_err();
        assert_eq!(
            classify(&err),
            Some(ConstraintViolation::Unique {
                table: "users".into(),
                column: "email".into()
            })
        );
    }

    #[test]
    fn dangling_reference_is_foreign_key() {
        let db = Database::open_in_memory().unwrap();
        insert_user(&db, "u1", "a@b.com", "31999990000").unwrap();

        let err = db
            .with_conn(|conn| crate::queries::users::set_republic(conn, "u1", Some("missing")))
            .unwrap_err();
        assert_eq!(classify(&err), Some(ConstraintViolation::ForeignKey));
    }

    #[test]
    fn unrelated_errors_are_not_classified() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(classify(&err), None);
    }

    #[test]
    fn parses_composite_unique_message() {
        assert_eq!(
            parse_unique_target("UNIQUE constraint failed: event_invites.event_id, event_invites.user_id"),
            Some(("event_invites".into(), "event_id".into()))
        );
    }
}

//! Query functions, grouped by table family. Every function takes a plain
//! `&Connection` so callers choose between `Database::with_conn` and
//! `Database::transaction`.

pub mod events;
pub mod feed;
pub mod invites;
pub mod republics;
pub mod users;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use std::str::FromStr;

/// Current time as stored in every `*_at` column.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read a TEXT column into a string-backed enum.
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// "?1, ?2, ..., ?n" for an IN list.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects the columns of a partial UPDATE. Only columns that were `set`
/// are written; `updated_at` is always bumped.
#[derive(Default)]
pub struct Changes {
    columns: Vec<(&'static str, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.columns.push((column, value.into()));
        self
    }

    /// `set` when `value` is present; `None` leaves the column untouched.
    pub fn set_opt<V: Into<Value>>(&mut self, column: &'static str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.set(column, v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Run the UPDATE against `table` for the row `id`. Returns the number of
    /// rows touched (0 when the id does not exist).
    pub fn apply(&self, conn: &Connection, table: &str, id: &str) -> Result<usize> {
        let mut assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, (col, _))| format!("{} = ?{}", col, i + 1))
            .collect();
        let n = self.columns.len();
        assignments.push(format!("updated_at = ?{}", n + 1));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            assignments.join(", "),
            n + 2
        );

        let mut values: Vec<Value> = self.columns.iter().map(|(_, v)| v.clone()).collect();
        values.push(Value::Text(now()));
        values.push(Value::Text(id.to_string()));

        let changed = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(changed)
    }
}

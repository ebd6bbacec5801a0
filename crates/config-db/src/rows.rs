//! Single-row configuration tables: column discovery, latest row, atomic replace.
//!
//! Each module owns a table with a `version` AUTOINCREMENT key and a
//! `created` timestamp. Only one row is retained; every save deletes and
//! reinserts inside one transaction so readers never observe an empty table.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;

use crate::{Database, DbError, ensure_active};

/// The most recent row of a configuration table, keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub version: i64,
    pub created: Option<DateTime<Utc>>,
    pub values: HashMap<String, SqlValue>,
}

impl StoredRow {
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }
}

impl Database {
    /// Read the latest row of `table`, or `None` when the table is empty.
    pub fn latest_row(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<Option<StoredRow>, DbError> {
        self.with_cancellable(cancel, |conn| {
            // Column names are resolved before the row query is prepared; the
            // single connection is never asked for a nested query while a row
            // is pending.
            let columns = table_columns(conn, table)?;
            ensure_active(cancel)?;
            select_latest(conn, table, &columns)
        })
    }

    /// Replace the contents of `table` with one row and return its version.
    pub fn replace_row(
        &self,
        cancel: &CancellationToken,
        table: &str,
        columns: &[String],
        values: Vec<SqlValue>,
    ) -> Result<i64, DbError> {
        self.with_cancellable(cancel, |conn| {
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {table}"), [])?;
            ensure_active(cancel)?;
            tx.execute(&insert_sql(table, columns), rusqlite::params_from_iter(values))?;
            let version = tx.last_insert_rowid();
            tx.commit()?;
            Ok(version)
        })
    }

    /// Column names of `table` in declaration order.
    pub fn table_columns(
        &self,
        cancel: &CancellationToken,
        table: &str,
    ) -> Result<Vec<String>, DbError> {
        self.with_cancellable(cancel, |conn| table_columns(conn, table))
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn select_latest(
    conn: &Connection,
    table: &str,
    columns: &[String],
) -> Result<Option<StoredRow>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT * FROM {table} ORDER BY version DESC LIMIT 1"
    ))?;
    let row = stmt
        .query_row([], |row| {
            let mut values = HashMap::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                values.insert(name.clone(), row.get::<_, SqlValue>(idx)?);
            }
            Ok(values)
        })
        .optional()?;

    Ok(row.map(|values| StoredRow {
        version: match values.get("version") {
            Some(SqlValue::Integer(v)) => *v,
            _ => 0,
        },
        created: values.get("created").and_then(parse_created),
        values,
    }))
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES");
    }
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders})",
        columns.join(", ")
    )
}

/// `created` is either unix seconds or a `CURRENT_TIMESTAMP`-style string.
fn parse_created(value: &SqlValue) -> Option<DateTime<Utc>> {
    match value {
        SqlValue::Integer(secs) => DateTime::from_timestamp(*secs, 0),
        SqlValue::Real(secs) => DateTime::from_timestamp(*secs as i64, 0),
        SqlValue::Text(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().expect("Failed to create test DB");
        db.migrate(
            "CREATE TABLE demo_config (
                version INTEGER PRIMARY KEY AUTOINCREMENT,
                created INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                name TEXT,
                retries INTEGER
            ) STRICT",
        )
        .expect("Failed to create demo table");
        db
    }

    fn columns() -> Vec<String> {
        vec!["name".to_string(), "retries".to_string()]
    }

    #[test]
    fn test_table_columns_in_declaration_order() {
        let db = test_db();
        let cancel = CancellationToken::new();
        let cols = db.table_columns(&cancel, "demo_config").unwrap();
        assert_eq!(cols, vec!["version", "created", "name", "retries"]);
    }

    #[test]
    fn test_empty_table_has_no_latest_row() {
        let db = test_db();
        let cancel = CancellationToken::new();
        assert!(db.latest_row(&cancel, "demo_config").unwrap().is_none());
    }

    #[test]
    fn test_replace_keeps_single_row_and_bumps_version() {
        let db = test_db();
        let cancel = CancellationToken::new();

        let v1 = db
            .replace_row(
                &cancel,
                "demo_config",
                &columns(),
                vec![SqlValue::Text("first".into()), SqlValue::Integer(1)],
            )
            .unwrap();
        let v2 = db
            .replace_row(
                &cancel,
                "demo_config",
                &columns(),
                vec![SqlValue::Text("second".into()), SqlValue::Integer(2)],
            )
            .unwrap();
        assert!(v2 > v1);

        let count = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM demo_config", [], |row| {
                    row.get::<_, i64>(0)
                })?)
            })
            .unwrap();
        assert_eq!(count, 1);

        let row = db.latest_row(&cancel, "demo_config").unwrap().unwrap();
        assert_eq!(row.version, v2);
        assert_eq!(row.get("name"), Some(&SqlValue::Text("second".into())));
        assert_eq!(row.get("retries"), Some(&SqlValue::Integer(2)));
        assert!(row.created.is_some());
    }

    #[test]
    fn test_cancelled_replace_leaves_table_untouched() {
        let db = test_db();
        let cancel = CancellationToken::new();
        db.replace_row(
            &cancel,
            "demo_config",
            &columns(),
            vec![SqlValue::Text("kept".into()), SqlValue::Integer(3)],
        )
        .unwrap();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let err = db
            .replace_row(
                &cancelled,
                "demo_config",
                &columns(),
                vec![SqlValue::Text("lost".into()), SqlValue::Integer(4)],
            )
            .unwrap_err();
        assert!(matches!(err, DbError::Cancelled));

        let row = db.latest_row(&cancel, "demo_config").unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&SqlValue::Text("kept".into())));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let db = test_db();
        let cancel = CancellationToken::new();
        assert!(db.latest_row(&cancel, "nope_config").is_err());
    }

    #[test]
    fn test_parse_created_formats() {
        assert_eq!(
            parse_created(&SqlValue::Integer(0)),
            DateTime::from_timestamp(0, 0)
        );
        assert!(parse_created(&SqlValue::Text("2024-01-02 03:04:05".into())).is_some());
        assert!(parse_created(&SqlValue::Text("2024-01-02T03:04:05Z".into())).is_some());
        assert!(parse_created(&SqlValue::Null).is_none());
    }

    #[test]
    fn test_insert_sql_without_columns() {
        assert_eq!(
            insert_sql("demo_config", &[]),
            "INSERT INTO demo_config DEFAULT VALUES"
        );
        assert_eq!(
            insert_sql("demo_config", &columns()),
            "INSERT INTO demo_config (name, retries) VALUES (?1, ?2)"
        );
    }
}

use parking_lot::ReentrantMutex;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chunk::Cursor;
use crate::client::{Client, Executor};
use crate::error::{Error, Result};
use crate::value::{Row, Value};

const MEMORY_PATH: &str = ":memory:";

fn default_id_column() -> String {
    "id".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// SQLite client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: String,
    /// Table the client operates on
    pub table_name: String,
    /// Column identifying records for updates and deletes
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// How long to wait on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and table
    pub fn new(db_path: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            table_name: table_name.into(),
            id_column: default_id_column(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }

    /// Config for a private in-memory database
    pub fn in_memory(table_name: impl Into<String>) -> Self {
        Self::new(MEMORY_PATH, table_name)
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::Text(text.to_string()),
                Err(_) => Value::Blob(bytes.to_vec()),
            },
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        }
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(value.into())
    }
}

/// Quotes an identifier for use in generated statements.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn placeholders(range: std::ops::Range<usize>) -> impl Iterator<Item = String> {
    range.map(|i| format!("?{}", i + 1))
}

/// Streams rows of a prepared statement one at a time.
pub struct SqliteCursor<'stmt> {
    rows: Option<rusqlite::Rows<'stmt>>,
    columns: Vec<String>,
    current: Option<Vec<Value>>,
}

impl<'stmt> SqliteCursor<'stmt> {
    fn new(rows: rusqlite::Rows<'stmt>, columns: Vec<String>) -> Self {
        Self {
            rows: Some(rows),
            columns,
            current: None,
        }
    }
}

/// Names of the result columns, which must be unique to key a [`Row`].
fn result_columns(stmt: &rusqlite::Statement<'_>) -> Result<Vec<String>> {
    let mut columns: Vec<String> = Vec::with_capacity(stmt.column_count());
    for name in stmt.column_names() {
        if columns.iter().any(|c| c == name) {
            return Err(Error::Shape(format!(
                "result column `{name}` appears more than once"
            )));
        }
        columns.push(name.to_string());
    }
    Ok(columns)
}

fn read_values(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Vec<Value>> {
    (0..width).map(|i| row.get_ref(i).map(Value::from)).collect()
}

impl Cursor for SqliteCursor<'_> {
    fn next(&mut self) -> Result<bool> {
        let rows = match self.rows.as_mut() {
            Some(rows) => rows,
            None => return Ok(false),
        };
        let fetched = match rows.next()? {
            Some(row) => Some(read_values(row, self.columns.len())?),
            None => None,
        };

        match fetched {
            Some(values) => {
                self.current = Some(values);
                Ok(true)
            }
            None => {
                self.close();
                Ok(false)
            }
        }
    }

    fn scan_into(&mut self, row: &mut Row) -> Result<()> {
        let values = self
            .current
            .take()
            .ok_or_else(|| Error::query("scan_into called without a current row"))?;
        row.extend(self.columns.iter().cloned().zip(values));
        Ok(())
    }

    fn close(&mut self) {
        self.current = None;
        self.rows = None;
    }
}

/// [`Executor`] backed by a single SQLite connection.
///
/// The connection lock is reentrant, so a chunk callback may issue further
/// statements through the same client while a query is being read.
pub struct SqliteExecutor {
    conn: ReentrantMutex<Connection>,
}

impl std::fmt::Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor").finish_non_exhaustive()
    }
}

impl SqliteExecutor {
    /// Opens the database named by `config`.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let conn = if config.db_path == MEMORY_PATH {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.db_path)
        }
        .map_err(|e| Error::Connectivity(Box::new(e)))?;

        conn.busy_timeout(config.busy_timeout())
            .map_err(|e| Error::Connectivity(Box::new(e)))?;
        tracing::debug!(path = %config.db_path, "opened sqlite database");

        Ok(Self::from_connection(conn))
    }

    /// Wraps an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: ReentrantMutex::new(conn),
        }
    }

    /// Runs `f` with the raw connection, e.g. to create tables.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<R>) -> Result<R> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }
}

impl Executor for SqliteExecutor {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
        visit: &mut dyn FnMut(&mut dyn Cursor) -> Result<()>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let columns = result_columns(&stmt)?;
        let rows = stmt.query(params_from_iter(params.iter()))?;

        let mut cursor = SqliteCursor::new(rows, columns);
        visit(&mut cursor)
    }

    fn persist(&self, table: &str, row: &Row, returning: Option<&str>) -> Result<Option<Value>> {
        let (columns, values): (Vec<&String>, Vec<&Value>) = row.iter().unzip();
        let mut sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                columns
                    .iter()
                    .map(|c| quote_identifier(c))
                    .collect::<Vec<_>>()
                    .join(", "),
                placeholders(0..values.len()).collect::<Vec<_>>().join(", "),
            )
        };

        if let Some(column) = returning {
            sql.push_str(" RETURNING ");
            sql.push_str(&quote_identifier(column));
        }

        let conn = self.conn.lock();
        let stored = match returning {
            Some(_) => Some(conn.query_row(&sql, params_from_iter(values), |r| r.get::<_, Value>(0))?),
            None => {
                conn.execute(&sql, params_from_iter(values))?;
                None
            }
        };
        tracing::trace!(table, stored = ?stored, "inserted row");
        Ok(stored)
    }

    fn persist_partial(&self, table: &str, id_column: &str, id: &Value, row: &Row) -> Result<()> {
        let (columns, mut values): (Vec<&String>, Vec<&Value>) = row.iter().unzip();
        let assignments = columns
            .iter()
            .zip(placeholders(0..columns.len()))
            .map(|(c, p)| format!("{} = {}", quote_identifier(c), p))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_identifier(table),
            assignments,
            quote_identifier(id_column),
            columns.len() + 1
        );
        values.push(id);

        let conn = self.conn.lock();
        let changed = conn.execute(&sql, params_from_iter(values))?;
        tracing::trace!(table, changed, "updated row");
        Ok(())
    }

    fn remove_by_id(&self, table: &str, id_column: &str, id: &Value) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_identifier(table),
            quote_identifier(id_column)
        );

        let conn = self.conn.lock();
        let changed = conn.execute(&sql, [id])?;
        tracing::trace!(table, changed, "deleted row");
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::Connectivity(Box::new(e)))?;
        Ok(())
    }
}

impl Client<SqliteExecutor> {
    /// Opens the configured database, checks it answers, and binds a
    /// client to the configured table.
    pub fn connect(config: SqliteConfig) -> Result<Self> {
        let executor = SqliteExecutor::open(&config)?;
        executor.ping()?;
        tracing::debug!(table = %config.table_name, "sqlite client ready");

        Ok(Client::new(executor, config.table_name).with_id_column(config.id_column))
    }
}

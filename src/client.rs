//! Table-bound facade over an execution collaborator.

use std::sync::Arc;

use crate::chunk::{self, ChunkParser, Cursor, CursorGuard};
use crate::codec;
use crate::error::{Error, Result};
use crate::record::{Record, Slot};
use crate::registry::{Registry, TypeDescriptor};
use crate::value::{Row, Value};

/// What the facade needs from the SQL engine.
///
/// Connection management, dialect and transport live behind this trait.
pub trait Executor {
    /// Runs `sql` and lends a cursor over its result to `visit`.
    ///
    /// The cursor only lives for the duration of the call.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
        visit: &mut dyn FnMut(&mut dyn Cursor) -> Result<()>,
    ) -> Result<()>;

    /// Inserts `row` into `table`.
    ///
    /// When `returning` names a column, the value the engine stored in it
    /// is returned. Null means nothing was stored or generated there.
    fn persist(&self, table: &str, row: &Row, returning: Option<&str>) -> Result<Option<Value>>;

    /// Writes the columns of `row` to the record identified by `id`.
    fn persist_partial(&self, table: &str, id_column: &str, id: &Value, row: &Row) -> Result<()>;

    /// Deletes the record identified by `id`.
    fn remove_by_id(&self, table: &str, id_column: &str, id: &Value) -> Result<()>;

    /// Checks that the engine is reachable.
    fn ping(&self) -> Result<()>;
}

/// Record operations bound to one table.
///
/// Cloning is cheap: clones share the executor and the descriptor registry.
#[derive(Debug)]
pub struct Client<E> {
    table: String,
    id_column: String,
    executor: Arc<E>,
    registry: Arc<Registry>,
}

impl<E> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            executor: Arc::clone(&self.executor),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Executor> Client<E> {
    /// Creates a client on `table` with a fresh registry.
    pub fn new(executor: E, table: impl Into<String>) -> Self {
        Self::with_registry(Arc::new(executor), table, Arc::new(Registry::new()))
    }

    /// Creates a client sharing an existing executor and registry.
    pub fn with_registry(executor: Arc<E>, table: impl Into<String>, registry: Arc<Registry>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            executor,
            registry,
        }
    }

    /// Sets the column that identifies records (defaults to `id`).
    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// A client on another table sharing this one's connection.
    pub fn change_table(&self, table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..self.clone()
        }
    }

    /// Runs `query` and decodes its first row into `record`.
    ///
    /// Additional rows are ignored; no row at all is [`Error::NotFound`].
    pub fn find_one<T: Record>(&self, record: &mut T, query: &str, params: &[Value]) -> Result<()> {
        let descriptor = self.registry.describe::<T>()?;
        tracing::debug!(table = %self.table, query, "find one");

        let mut found = false;
        self.executor.query(query, params, &mut |cursor| {
            let mut cursor = CursorGuard::new(cursor);
            if !cursor.next()? {
                return Ok(());
            }
            let mut row = Row::new();
            cursor.scan_into(&mut row)?;
            codec::decode(&descriptor, &row, &mut *record)?;
            found = true;
            Ok(())
        })?;

        if found {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Runs a query that returns many rows and feeds them to the parser's
    /// callback in chunks of `chunk_size` records.
    pub fn query_chunks<S, F>(&self, parser: ChunkParser<'_, S, F>) -> Result<()>
    where
        S: Slot,
        F: FnMut(&mut Vec<S>) -> anyhow::Result<()>,
    {
        let ChunkParser {
            query,
            params,
            chunk,
            chunk_size,
            mut for_each_chunk,
        } = parser;
        chunk::ensure_chunk_size(chunk_size)?;
        tracing::debug!(table = %self.table, query, chunk_size, "query chunks");

        self.executor.query(query, &params, &mut |cursor| {
            chunk::materialize(
                &self.registry,
                cursor,
                &mut *chunk,
                chunk_size,
                &mut for_each_chunk,
            )
        })
    }

    /// Inserts each record individually, stopping at the first failure.
    ///
    /// An id column holding null or `0` is left out so the database can
    /// generate it. Whatever the database stored in the id column is then
    /// written back into the record, unless it stored null.
    pub fn insert<T: Record>(&self, records: &mut [T]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let descriptor = self.registry.describe::<T>()?;
        tracing::debug!(table = %self.table, count = records.len(), "insert");

        for (index, record) in records.iter_mut().enumerate() {
            self.insert_one(&descriptor, record)
                .map_err(|err| Error::item("insert", index, err))?;
        }
        Ok(())
    }

    fn insert_one<T: Record>(&self, descriptor: &TypeDescriptor, record: &mut T) -> Result<()> {
        let mut row = codec::encode(descriptor, record);
        let generate_id = matches!(
            row.get(&self.id_column),
            Some(Value::Null) | Some(Value::Integer(0))
        );
        if generate_id {
            row.remove(&self.id_column);
        }

        // ids supplied by the caller are kept as they are
        let write_back = if row.contains_key(&self.id_column) {
            None
        } else {
            descriptor.field_index(&self.id_column)
        };
        let returning = write_back.map(|_| self.id_column.as_str());

        let stored = self.executor.persist(&self.table, &row, returning)?;
        if let (Some(id), Some(index)) = (stored, write_back) {
            if id.is_null() {
                tracing::debug!(table = %self.table, "no id stored, record left unchanged");
                return Ok(());
            }
            record.write_field(index, id).map_err(|err| Error::TypeMismatch {
                column: self.id_column.clone(),
                from: err.from,
                to: err.to,
            })?;
        }
        Ok(())
    }

    /// Updates each record by id, stopping at the first failure.
    ///
    /// Only the columns a record holds are written: absent optional fields
    /// keep their stored value and the id column is never rewritten.
    pub fn update<T: Record>(&self, records: &[T]) -> Result<()> {
        let descriptor = self.registry.describe::<T>()?;
        tracing::debug!(table = %self.table, count = records.len(), "update");

        for (index, record) in records.iter().enumerate() {
            let mut row = codec::encode(&descriptor, record);
            let id = match row.remove(&self.id_column) {
                Some(id) if !id.is_null() => id,
                _ => {
                    let err = Error::MissingId {
                        column: self.id_column.clone(),
                    };
                    return Err(Error::item("update", index, err));
                }
            };
            if row.is_empty() {
                tracing::debug!(table = %self.table, index, "nothing to update");
                continue;
            }
            self.executor
                .persist_partial(&self.table, &self.id_column, &id, &row)
                .map_err(|err| Error::item("update", index, err))?;
        }
        Ok(())
    }

    /// Deletes records by id, stopping at the first failure.
    pub fn delete<I>(&self, ids: impl IntoIterator<Item = I>) -> Result<()>
    where
        I: Into<Value>,
    {
        for (index, id) in ids.into_iter().enumerate() {
            let id = id.into();
            tracing::debug!(table = %self.table, index, "delete");
            self.executor
                .remove_by_id(&self.table, &self.id_column, &id)
                .map_err(|err| Error::item("delete", index, err))?;
        }
        Ok(())
    }
}

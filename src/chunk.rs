//! Chunked materialization of large result sets.
//!
//! Rows are decoded straight into a caller-owned buffer which is handed to
//! a callback every time it holds `chunk_size` records, and once more for
//! a final partial chunk. Memory stays bounded by the chunk size no matter
//! how many rows the query returns.

use crate::codec;
use crate::error::{Error, Result};
use crate::record::Slot;
use crate::registry::Registry;
use crate::value::{Row, Value};

/// Forward-only handle over a streaming query result.
pub trait Cursor {
    /// Advances to the next row. Returns `false` once the result is exhausted.
    fn next(&mut self) -> Result<bool>;

    /// Copies the current row into `row`.
    fn scan_into(&mut self, row: &mut Row) -> Result<()>;

    /// Releases the underlying result. Must be safe to call more than once.
    fn close(&mut self);
}

/// Closes the wrapped cursor when dropped.
pub struct CursorGuard<'a> {
    cursor: &'a mut dyn Cursor,
}

impl<'a> CursorGuard<'a> {
    pub fn new(cursor: &'a mut dyn Cursor) -> Self {
        Self { cursor }
    }

    pub fn next(&mut self) -> Result<bool> {
        self.cursor.next()
    }

    pub fn scan_into(&mut self, row: &mut Row) -> Result<()> {
        self.cursor.scan_into(row)
    }
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.cursor.close();
    }
}

/// Describes a chunked query: the statement, where the records go, and
/// what to do with each chunk.
///
/// `chunk` holds records by value (`Vec<T>`) or boxed (`Vec<Box<T>>`) and
/// carries at most `chunk_size` records each time `for_each_chunk` runs.
pub struct ChunkParser<'a, S, F> {
    pub query: &'a str,
    pub params: Vec<Value>,
    pub chunk: &'a mut Vec<S>,
    pub chunk_size: usize,
    pub for_each_chunk: F,
}

impl<'a, S, F> ChunkParser<'a, S, F>
where
    S: Slot,
    F: FnMut(&mut Vec<S>) -> anyhow::Result<()>,
{
    pub fn new(query: &'a str, chunk: &'a mut Vec<S>, chunk_size: usize, for_each_chunk: F) -> Self {
        Self {
            query,
            params: Vec::new(),
            chunk,
            chunk_size,
            for_each_chunk,
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }
}

/// Rejects a chunk size that could never hold a record.
pub(crate) fn ensure_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::Shape("chunk size must be at least 1".to_string()));
    }
    Ok(())
}

/// Decodes every row of `cursor` into `chunk`, calling `on_chunk` once per
/// full chunk and once for a trailing partial chunk.
///
/// Elements already in `chunk` are reused; missing ones are allocated.
/// When the cursor yields no rows `on_chunk` never runs and `chunk` is left
/// as it was. The cursor is closed before returning, whatever the outcome.
pub fn materialize<S, F>(
    registry: &Registry,
    cursor: &mut dyn Cursor,
    chunk: &mut Vec<S>,
    chunk_size: usize,
    mut on_chunk: F,
) -> Result<()>
where
    S: Slot,
    F: FnMut(&mut Vec<S>) -> anyhow::Result<()>,
{
    let mut cursor = CursorGuard::new(cursor);
    ensure_chunk_size(chunk_size)?;
    let descriptor = registry.describe::<S::Record>()?;

    let mut row = Row::new();
    let mut idx = 0;
    let mut delivered = 0usize;
    while cursor.next()? {
        row.clear();
        cursor.scan_into(&mut row)?;

        if chunk.len() <= idx {
            chunk.push(S::vacant());
        }
        codec::decode(&descriptor, &row, chunk[idx].record_mut())?;
        idx += 1;

        if idx == chunk_size {
            chunk.truncate(chunk_size);
            on_chunk(&mut *chunk).map_err(Error::Callback)?;
            delivered += 1;
            tracing::trace!(chunk = delivered, rows = chunk_size, "delivered chunk");
            idx = 0;
        }
    }

    // nothing pending: no rows at all, or the last row closed a full chunk
    if idx > 0 {
        chunk.truncate(idx);
        on_chunk(&mut *chunk).map_err(Error::Callback)?;
        delivered += 1;
        tracing::trace!(chunk = delivered, rows = idx, "delivered final chunk");
    }

    Ok(())
}

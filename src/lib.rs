//! Record mapping, chunked reads and partial updates on top of SQLite.
//!
//! # Intention
//!
//! - Map plain structs to rows (column name to value) and back, using a
//!   field-to-column table declared once per type.
//! - Read large result sets in fixed-size chunks without holding every row
//!   in memory.
//! - Offer find-one, insert, partial update and delete operations bound to
//!   one table.
//!
//! # Architectural Boundaries
//!
//! - SQL execution sits behind the [`Executor`] trait; [`SqliteExecutor`]
//!   is the bundled implementation.
//! - No query building, schema migration or transaction handling.
//!
//! # Example
//!
//! ```ignore
//! use rust_sqlite_records::{record, ChunkParser, Client, SqliteConfig};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct User {
//!         #[column = "id"]
//!         pub id: i64,
//!         #[column = "name"]
//!         pub name: String,
//!         #[column = "email"]
//!         pub email: Option<String>,
//!     }
//! }
//!
//! let client = Client::connect(SqliteConfig::new("app.db", "users"))?;
//! let mut users = vec![User { name: "Ann".into(), ..Default::default() }];
//! client.insert(&mut users)?;
//!
//! let mut chunk: Vec<User> = Vec::new();
//! client.query_chunks(ChunkParser::new("SELECT * FROM users", &mut chunk, 100, |users| {
//!     println!("{} users", users.len());
//!     Ok(())
//! }))?;
//! ```

pub mod chunk;
pub mod client;
pub mod codec;
pub mod error;
pub mod record;
pub mod registry;
pub mod sqlite;
pub mod value;

pub use chunk::{materialize, ChunkParser, Cursor, CursorGuard};
pub use client::{Client, Executor};
pub use codec::{decode, encode, fill_record, fill_records};
pub use error::{Error, Result};
pub use record::{FieldDef, Record, Slot};
pub use registry::{Registry, TypeDescriptor};
pub use sqlite::{SqliteConfig, SqliteCursor, SqliteExecutor};
pub use value::{ColumnValue, ConversionError, Row, Value};

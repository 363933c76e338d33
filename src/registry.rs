//! Type descriptor cache.
//!
//! A [`TypeDescriptor`] is the column-name/field-index correspondence of a
//! record type. It is computed once per type and kept for the lifetime of
//! the [`Registry`]. Programs have a small, finite set of record types, so
//! entries are never evicted.

use parking_lot::RwLock;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::codec;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::Row;

/// Cached column mapping of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_name: &'static str,
    field_index_by_column: HashMap<String, usize>,
    column_by_field_index: HashMap<usize, String>,
    columns: Vec<(usize, String)>,
}

impl TypeDescriptor {
    /// Builds the descriptor of `T` from its declared fields.
    ///
    /// Fields without a column (or with an empty one) are skipped.
    pub fn scan<T: Record>() -> Result<Self> {
        let mut descriptor = TypeDescriptor {
            type_name: type_name::<T>(),
            field_index_by_column: HashMap::new(),
            column_by_field_index: HashMap::new(),
            columns: Vec::new(),
        };

        for (index, field) in T::fields().into_iter().enumerate() {
            let column = match field.column {
                Some(column) if !column.is_empty() => column,
                _ => continue,
            };
            if descriptor.field_index_by_column.contains_key(column) {
                return Err(Error::Shape(format!(
                    "column `{}` is declared twice on {}",
                    column, descriptor.type_name
                )));
            }
            descriptor
                .field_index_by_column
                .insert(column.to_string(), index);
            descriptor
                .column_by_field_index
                .insert(index, column.to_string());
            descriptor.columns.push((index, column.to_string()));
        }

        Ok(descriptor)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Field position mapped to `column`.
    pub fn field_index(&self, column: &str) -> Option<usize> {
        self.field_index_by_column.get(column).copied()
    }

    /// Column mapped to the field at `index`.
    pub fn column(&self, index: usize) -> Option<&str> {
        self.column_by_field_index.get(&index).map(String::as_str)
    }

    /// Mapped `(field index, column)` pairs in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = (usize, &str)> {
        self.columns.iter().map(|(i, c)| (*i, c.as_str()))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.field_index_by_column.contains_key(column)
    }
}

/// Process-lifetime cache of [`TypeDescriptor`]s keyed by type.
///
/// Safe to share between threads. First-time population of a type is
/// serialized so each type is scanned exactly once.
#[derive(Debug, Default)]
pub struct Registry {
    descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
    scans: AtomicUsize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor of `T`, scanning it on first use.
    pub fn describe<T: Record>(&self) -> Result<Arc<TypeDescriptor>> {
        let key = TypeId::of::<T>();
        if let Some(descriptor) = self.descriptors.read().get(&key) {
            return Ok(Arc::clone(descriptor));
        }

        let mut descriptors = self.descriptors.write();
        // another caller may have won the race for the write lock
        if let Some(descriptor) = descriptors.get(&key) {
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = Arc::new(TypeDescriptor::scan::<T>()?);
        self.scans.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            record = descriptor.type_name(),
            columns = descriptor.columns.len(),
            "scanned record type"
        );
        descriptors.insert(key, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Number of descriptor scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Number of cached record types.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encodes `record` using the cached descriptor of `T`.
    pub fn encode<T: Record>(&self, record: &T) -> Result<Row> {
        let descriptor = self.describe::<T>()?;
        Ok(codec::encode(&descriptor, record))
    }

    /// Decodes `row` into `record` using the cached descriptor of `T`.
    pub fn decode<T: Record>(&self, row: &Row, record: &mut T) -> Result<()> {
        let descriptor = self.describe::<T>()?;
        codec::decode(&descriptor, row, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldDef;
    use crate::value::{ConversionError, Value};
    use std::thread;

    crate::record! {
        #[derive(Debug, Default)]
        struct User {
            #[column = "id"]
            id: i64,
            #[column = "name"]
            name: String,
            #[column = ""]
            note: String,
            #[column = "email"]
            email: Option<String>,
        }
    }

    #[derive(Default)]
    struct Twice;

    impl Record for Twice {
        fn fields() -> Vec<FieldDef> {
            vec![
                FieldDef { name: "a", column: Some("x"), ty: "i64" },
                FieldDef { name: "b", column: Some("x"), ty: "i64" },
            ]
        }

        fn read_field(&self, _index: usize) -> Option<Value> {
            None
        }

        fn write_field(
            &mut self,
            _index: usize,
            value: Value,
        ) -> std::result::Result<(), ConversionError> {
            Err(ConversionError::unmapped(&value))
        }
    }

    #[test]
    fn test_descriptor_skips_untagged_fields() {
        let descriptor = TypeDescriptor::scan::<User>().unwrap();
        assert_eq!(descriptor.field_index("id"), Some(0));
        assert_eq!(descriptor.field_index("email"), Some(3));
        assert_eq!(descriptor.column(1), Some("name"));
        assert_eq!(descriptor.column(2), None);
        assert!(!descriptor.has_column(""));

        let columns: Vec<_> = descriptor.columns().collect();
        assert_eq!(columns, vec![(0, "id"), (1, "name"), (3, "email")]);
    }

    #[test]
    fn test_describe_scans_once() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        let first = registry.describe::<User>().unwrap();
        let second = registry.describe::<User>().unwrap();

        assert_eq!(*first, *second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.scan_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_first_use_scans_once() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.describe::<User>().map(|d| d.type_name()))
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(registry.scan_count(), 1);
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        let registry = Registry::new();
        let err = registry.describe::<Twice>().unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
        assert!(registry.is_empty());
        assert_eq!(registry.scan_count(), 0);
    }
}

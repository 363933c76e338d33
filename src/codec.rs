//! Record ⇄ row conversion.

use crate::error::{Error, Result};
use crate::record::{Record, Slot};
use crate::registry::{Registry, TypeDescriptor};
use crate::value::Row;

/// Converts `record` to a row.
///
/// Absent optional fields are left out of the row, so the row only
/// carries the columns the record actually holds.
pub fn encode<T: Record>(descriptor: &TypeDescriptor, record: &T) -> Row {
    descriptor
        .columns()
        .filter_map(|(index, column)| {
            record
                .read_field(index)
                .map(|value| (column.to_string(), value))
        })
        .collect()
}

/// Writes every column of `row` into the matching field of `record`.
///
/// Fields whose column is missing from the row are left untouched.
pub fn decode<T: Record>(descriptor: &TypeDescriptor, row: &Row, record: &mut T) -> Result<()> {
    for (column, value) in row {
        let index = descriptor
            .field_index(column)
            .ok_or_else(|| Error::UnknownColumn {
                column: column.clone(),
                record: descriptor.type_name(),
            })?;

        record
            .write_field(index, value.clone())
            .map_err(|err| Error::TypeMismatch {
                column: column.clone(),
                from: err.from,
                to: err.to,
            })?;
    }
    Ok(())
}

/// Fills `record` from a literal row.
///
/// Meant for unit tests that mock the response of the database.
pub fn fill_record<T: Record>(registry: &Registry, record: &mut T, row: &Row) -> Result<()> {
    registry.decode(row, record)
}

/// Fills `records` from literal rows, growing the vector as needed and
/// reusing elements that are already there.
///
/// Meant for unit tests that mock the response of the database.
pub fn fill_records<S: Slot>(registry: &Registry, records: &mut Vec<S>, rows: &[Row]) -> Result<()> {
    let descriptor = registry.describe::<S::Record>()?;
    for (idx, row) in rows.iter().enumerate() {
        if records.len() <= idx {
            records.push(S::vacant());
        }
        decode(&descriptor, row, records[idx].record_mut())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    crate::record! {
        #[derive(Debug, Clone, Default, PartialEq)]
        struct User {
            #[column = "id"]
            id: i64,
            #[column = "name"]
            name: String,
            #[column = "email"]
            email: Option<String>,
            #[column = "score"]
            score: f64,
            session: Option<u64>,
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_round_trip_of_complete_record() {
        let registry = Registry::new();
        let descriptor = registry.describe::<User>().unwrap();
        let user = User {
            id: 1,
            name: "Ann".into(),
            email: Some("ann@example.com".into()),
            score: 2.5,
            session: None,
        };

        let encoded = encode(&descriptor, &user);
        let mut decoded = User::default();
        decode(&descriptor, &encoded, &mut decoded).unwrap();

        assert_eq!(decoded, user);
    }

    #[test]
    fn test_encode_omits_absent_optional() {
        let registry = Registry::new();
        let user = User {
            id: 1,
            name: "Ann".into(),
            session: Some(3),
            ..User::default()
        };

        let encoded = registry.encode(&user).unwrap();

        assert!(!encoded.contains_key("email"));
        assert!(!encoded.contains_key("session"));
        assert_eq!(encoded.get("name"), Some(&Value::Text("Ann".into())));
        assert_eq!(encoded.len(), 3);
    }

    #[test]
    fn test_decode_partial_row_leaves_other_fields() {
        let registry = Registry::new();
        let mut user = User::default();

        registry
            .decode(
                &row(&[("id", Value::Integer(1)), ("name", Value::Text("Ann".into()))]),
                &mut user,
            )
            .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.name, "Ann");
        assert_eq!(user.email, None);
    }

    #[test]
    fn test_decode_reports_type_mismatch() {
        let registry = Registry::new();
        let mut user = User::default();

        let err = registry
            .decode(&row(&[("name", Value::Integer(5))]), &mut user)
            .unwrap_err();

        match err {
            Error::TypeMismatch { column, from, to } => {
                assert_eq!(column, "name");
                assert_eq!(from, "integer");
                assert_eq!(to, "String");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_column() {
        let registry = Registry::new();
        let mut user = User::default();

        let err = registry
            .decode(&row(&[("session", Value::Integer(5))]), &mut user)
            .unwrap_err();

        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "session"));
    }

    #[test]
    fn test_fill_records_grows_and_reuses() {
        let registry = Registry::new();
        let mut users = vec![User {
            id: 10,
            name: "Old".into(),
            email: Some("old@example.com".into()),
            score: 1.0,
            session: Some(1),
        }];

        fill_records(
            &registry,
            &mut users,
            &[
                row(&[("id", Value::Integer(1)), ("name", Value::Text("Ann".into()))]),
                row(&[("id", Value::Integer(2)), ("name", Value::Text("Bob".into()))]),
            ],
        )
        .unwrap();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "Ann");
        // reused element keeps columns the row did not carry
        assert_eq!(users[0].email.as_deref(), Some("old@example.com"));
        assert_eq!(users[1], User { id: 2, name: "Bob".into(), ..User::default() });
    }

    #[test]
    fn test_fill_record_into_boxed_slots() {
        let registry = Registry::new();
        let mut users: Vec<Box<User>> = Vec::new();
        fill_records(&registry, &mut users, &[row(&[("id", Value::Integer(7))])]).unwrap();
        assert_eq!(users[0].id, 7);

        let mut user = User::default();
        fill_record(&registry, &mut user, &row(&[("score", Value::Integer(3))])).unwrap();
        assert_eq!(user.score, 3.0);
    }
}

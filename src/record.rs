//! Statically declared record types.
//!
//! A record is a plain struct whose fields are mapped to table columns by
//! name. The mapping is declared once, either by implementing [`Record`]
//! by hand or through the [`record!`](crate::record) macro:
//!
//! ```ignore
//! use rust_sqlite_records::record;
//!
//! record! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct User {
//!         #[column = "id"]
//!         pub id: i64,
//!         #[column = "name"]
//!         pub name: String,
//!         #[column = "email"]
//!         pub email: Option<String>,
//!         // no column: never read from or written to rows
//!         pub dirty: bool,
//!     }
//! }
//! ```
//!
//! `Option<T>` fields are optional: when `None` they are left out of
//! encoded rows, which is what makes partial updates work.
//!
//! A hand-written [`Record`] works in boxed chunk buffers (`Vec<Box<T>>`)
//! as is. Buffers holding records by value (`Vec<T>`) also need a [`Slot`]
//! impl for `T`, which the macro emits and hand-written records must
//! provide themselves:
//!
//! ```ignore
//! impl Slot for Manual {
//!     type Record = Manual;
//!
//!     fn vacant() -> Self {
//!         Manual::default()
//!     }
//!
//!     fn record_mut(&mut self) -> &mut Manual {
//!         self
//!     }
//! }
//! ```

use crate::value::{ConversionError, Value};

/// One declared field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name
    pub name: &'static str,
    /// Column the field maps to; `None` or `""` leaves the field unmapped
    pub column: Option<&'static str>,
    /// Rust type of the field
    pub ty: &'static str,
}

/// A struct that can be converted to and from a [`Row`](crate::Row).
///
/// Field positions are the indexes into [`Record::fields`].
pub trait Record: Default + 'static {
    /// All declared fields, in declaration order.
    fn fields() -> Vec<FieldDef>;

    /// Current value of the field at `index`.
    ///
    /// Returns `None` for absent optionals and unmapped fields.
    fn read_field(&self, index: usize) -> Option<Value>;

    /// Stores `value` into the field at `index`.
    fn write_field(&mut self, index: usize, value: Value) -> Result<(), ConversionError>;
}

/// Element of a chunk buffer: a record stored by value or boxed.
///
/// `Box<T>` is a slot for every record. By-value slots come from
/// [`record!`](crate::record) or a hand-written impl.
pub trait Slot {
    type Record: Record;

    /// A freshly allocated, zeroed element.
    fn vacant() -> Self;

    fn record_mut(&mut self) -> &mut Self::Record;
}

impl<T: Record> Slot for Box<T> {
    type Record = T;

    fn vacant() -> Self {
        Box::default()
    }

    fn record_mut(&mut self) -> &mut T {
        self
    }
}

impl ConversionError {
    /// Error for writes aimed at a field with no column.
    pub fn unmapped(value: &Value) -> Self {
        Self {
            from: value.kind(),
            to: "unmapped field",
        }
    }
}

/// Declares a struct together with its [`Record`] and [`Slot`] impls.
///
/// Fields tagged `#[column = "name"]` are mapped; their types must
/// implement [`ColumnValue`](crate::ColumnValue). Untagged fields may be of
/// any type. Other field attributes, doc comments included, are kept on the
/// generated struct. The struct must implement `Default`.
#[macro_export]
macro_rules! record {
    (@column $column:literal) => {
        ::core::option::Option::Some($column)
    };
    (@column) => {
        ::core::option::Option::None
    };
    (@read $this:ident . $field:ident : $ty:ty, $column:literal) => {
        <$ty as $crate::ColumnValue>::to_value(&$this.$field)
    };
    (@read $this:ident . $field:ident : $ty:ty) => {
        ::core::option::Option::None
    };
    (@write $this:ident . $field:ident : $ty:ty, $value:ident, $column:literal) => {
        <$ty as $crate::ColumnValue>::from_value($value).map(|v| $this.$field = v)
    };
    (@write $this:ident . $field:ident : $ty:ty, $value:ident) => {
        ::core::result::Result::Err($crate::ConversionError::unmapped(&$value))
    };

    // Field list parser: `[done fields] [pending attributes] [pending column]`.
    (@fields $header:tt [$($done:tt)*] [] []) => {
        $crate::record!(@emit $header $($done)*);
    };
    (@fields $header:tt [$($done:tt)*] [$($attrs:tt)*] [$($column:tt)*]
        #[column = $col:literal] $($rest:tt)*
    ) => {
        $crate::record!(@fields $header [$($done)*] [$($attrs)*] [$col] $($rest)*);
    };
    (@fields $header:tt [$($done:tt)*] [$($attrs:tt)*] [$($column:tt)*]
        #[$fattr:meta] $($rest:tt)*
    ) => {
        $crate::record!(@fields $header [$($done)*] [$($attrs)* #[$fattr]] [$($column)*] $($rest)*);
    };
    (@fields $header:tt [$($done:tt)*] [$($attrs:tt)*] [$($column:tt)*]
        $fvis:vis $field:ident : $ty:ty $(, $($rest:tt)*)?
    ) => {
        $crate::record!(@fields $header
            [$($done)* { $($attrs)* } $fvis $field : $ty => [$($column)*]]
            [] []
            $($($rest)*)?
        );
    };

    (@emit
        { $(#[$meta:meta])* $vis:vis struct $name:ident }
        $(
            { $(#[$fattr:meta])* } $fvis:vis $field:ident : $ty:ty => [$($column:literal)?]
        )*
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fattr])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Record for $name {
            fn fields() -> ::std::vec::Vec<$crate::FieldDef> {
                ::std::vec![
                    $(
                        $crate::FieldDef {
                            name: ::core::stringify!($field),
                            column: $crate::record!(@column $($column)?),
                            ty: ::core::any::type_name::<$ty>(),
                        },
                    )*
                ]
            }

            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn read_field(&self, index: usize) -> ::core::option::Option<$crate::Value> {
                let mut position = 0usize;
                $(
                    if position == index {
                        return $crate::record!(@read self . $field : $ty $(, $column)?);
                    }
                    position += 1;
                )*
                ::core::option::Option::None
            }

            #[allow(unused_assignments, unused_mut)]
            fn write_field(
                &mut self,
                index: usize,
                value: $crate::Value,
            ) -> ::core::result::Result<(), $crate::ConversionError> {
                let mut position = 0usize;
                $(
                    if position == index {
                        return $crate::record!(@write self . $field : $ty, value $(, $column)?);
                    }
                    position += 1;
                )*
                ::core::result::Result::Err($crate::ConversionError::unmapped(&value))
            }
        }

        impl $crate::Slot for $name {
            type Record = $name;

            fn vacant() -> Self {
                <$name as ::core::default::Default>::default()
            }

            fn record_mut(&mut self) -> &mut $name {
                self
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($body:tt)*
        }
    ) => {
        $crate::record!(@fields { $(#[$meta])* $vis struct $name } [] [] [] $($body)*);
    };
}

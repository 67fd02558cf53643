//! Shape descriptors used to document request and response bodies.
//!
//! A route declaration names its body types; the [`Describe`] implementation of each type
//! produces a small [`Schema`] tree (field name → kind) that the specification builder turns
//! into JSON Schema. Nothing here is consulted at request time.
//!
//! User types get an implementation through the [`describe!`](crate::describe) macro:
//!
//! ```
//! use gantry_core::{describe, Describe, Schema};
//!
//! describe! {
//!     #[derive(Debug, Clone)]
//!     pub struct Item {
//!         pub id: String,
//!         pub tags: Vec<String>,
//!         pub stock: Option<u32>,
//!     }
//! }
//!
//! let schema = Item::schema();
//! assert_eq!(schema.field("id"), Some(&Schema::String));
//! ```
//!
//! Inside another schema a described struct appears as [`Schema::Ref`]; its definition is
//! collected separately through [`Describe::definitions`], which also lets a struct refer to itself.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

/// Named object definitions, keyed by type name.
pub type Definitions = IndexMap<&'static str, ObjectSchema>;

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// No body at all; the specification omits the content entry.
    Empty,
    /// Any JSON value.
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<Schema>),
    /// An object with arbitrary keys whose values share one schema.
    Map(Box<Schema>),
    Optional(Box<Schema>),
    Object(ObjectSchema),
    /// A named object whose definition lives in [`Definitions`].
    Ref(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    name: Option<&'static str>,
    fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: &'static str,
    schema: Schema,
}

impl Schema {
    /// The JSON Schema type name of this node.
    pub fn kind(&self) -> &'static str {
        match self {
            Schema::Empty => "empty",
            Schema::Any => "any",
            Schema::String => "string",
            Schema::Integer => "integer",
            Schema::Number => "number",
            Schema::Boolean => "boolean",
            Schema::Array(_) => "array",
            Schema::Map(_) | Schema::Object(_) | Schema::Ref(_) => "object",
            Schema::Optional(inner) => inner.kind(),
        }
    }

    /// Whether this is the "no body" schema.
    pub fn is_empty(&self) -> bool {
        matches!(self, Schema::Empty)
    }

    /// Looks up a field of an object schema, seeing through `Optional`.
    pub fn field(&self, name: &str) -> Option<&Schema> {
        match self {
            Schema::Object(object) => object.fields.iter().find(|f| f.name == name).map(|f| &f.schema),
            Schema::Optional(inner) => inner.field(name),
            _ => None,
        }
    }
}

impl ObjectSchema {
    /// An object rendered once under `name` and referenced elsewhere.
    pub fn named(name: &'static str, fields: Vec<Field>) -> Self {
        Self { name: Some(name), fields }
    }

    /// An object rendered inline.
    pub fn anonymous(fields: Vec<Field>) -> Self {
        Self { name: None, fields }
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl Field {
    pub fn new(name: &'static str, schema: Schema) -> Self {
        Self { name, schema }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields are required unless their schema is `Optional`.
    pub fn is_required(&self) -> bool {
        !matches!(self.schema, Schema::Optional(_))
    }
}

/// Types that can describe their own shape.
pub trait Describe {
    /// The full shape of the type.
    fn schema() -> Schema;

    /// The shape as embedded in another schema; named types answer with a [`Schema::Ref`].
    fn reference() -> Schema {
        Self::schema()
    }

    /// Adds the named objects this type depends on, itself included, to `definitions`.
    fn definitions(definitions: &mut Definitions) {
        let _ = definitions;
    }
}

macro_rules! impl_describe {
    ($schema:ident => $($ty:ty),+) => {
        $(
            impl Describe for $ty {
                #[inline]
                fn schema() -> Schema {
                    Schema::$schema
                }
            }
        )+
    };
}

impl_describe!(String => String, str, char);
impl_describe!(Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
impl_describe!(Number => f32, f64);
impl_describe!(Boolean => bool);
impl_describe!(Any => serde_json::Value);
impl_describe!(Empty => ());

impl<T: Describe + ?Sized> Describe for &T {
    fn schema() -> Schema {
        T::schema()
    }

    fn reference() -> Schema {
        T::reference()
    }

    fn definitions(definitions: &mut Definitions) {
        T::definitions(definitions);
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn schema() -> Schema {
        T::schema()
    }

    fn reference() -> Schema {
        T::reference()
    }

    fn definitions(definitions: &mut Definitions) {
        T::definitions(definitions);
    }
}

macro_rules! impl_describe_container {
    ($variant:ident => $([$($generics:tt)*] $ty:ty, $inner:ident);+ $(;)?) => {
        $(
            impl<$($generics)*> Describe for $ty {
                fn schema() -> Schema {
                    Schema::$variant(Box::new($inner::reference()))
                }

                fn definitions(definitions: &mut Definitions) {
                    $inner::definitions(definitions);
                }
            }
        )+
    };
}

impl_describe_container!(Optional => [T: Describe] Option<T>, T);
impl_describe_container!(Array => [T: Describe] Vec<T>, T; [T: Describe] [T], T);
impl_describe_container!(Map => [K, V: Describe, S] HashMap<K, V, S>, V; [K, V: Describe] BTreeMap<K, V>, V);

/// Declares a struct and implements [`Describe`](crate::Describe) for it.
///
/// The schema is named after the struct and lists its fields in declaration order. Fields of
/// described struct types are stored as references, so a struct may contain itself.
#[macro_export]
macro_rules! describe {
    ($(
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$field_meta:meta])* $field_vis:vis $field:ident : $field_ty:ty),* $(,)?
        }
    )+) => {
        $(
            $(#[$meta])*
            $vis struct $name {
                $($(#[$field_meta])* $field_vis $field: $field_ty,)*
            }

            impl $crate::Describe for $name {
                fn schema() -> $crate::Schema {
                    $crate::Schema::Object($crate::ObjectSchema::named(
                        stringify!($name),
                        vec![$($crate::Field::new(stringify!($field), <$field_ty as $crate::Describe>::reference()),)*],
                    ))
                }

                fn reference() -> $crate::Schema {
                    $crate::Schema::Ref(stringify!($name))
                }

                fn definitions(definitions: &mut $crate::Definitions) {
                    if definitions.contains_key(stringify!($name)) {
                        return;
                    }
                    if let $crate::Schema::Object(object) = <Self as $crate::Describe>::schema() {
                        definitions.insert(stringify!($name), object);
                    }
                    $(<$field_ty as $crate::Describe>::definitions(definitions);)*
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    describe! {
        #[allow(dead_code, reason = "only the schema is inspected")]
        struct Inner {
            flag: bool,
        }

        #[allow(dead_code, reason = "only the schema is inspected")]
        struct Outer {
            id: String,
            count: u32,
            ratio: f64,
            inner: Inner,
            items: Vec<Inner>,
            note: Option<String>,
            extra: HashMap<String, i64>,
        }
    }

    #[test]
    fn primitives_describe_their_kind() {
        assert_eq!(String::schema().kind(), "string");
        assert_eq!(u64::schema().kind(), "integer");
        assert_eq!(f32::schema().kind(), "number");
        assert_eq!(bool::schema().kind(), "boolean");
        assert!(<()>::schema().is_empty());
        assert_eq!(<Option<String>>::schema().kind(), "string");
    }

    #[test]
    fn struct_fields_are_listed_in_order() {
        let schema = Outer::schema();
        let Schema::Object(object) = &schema else { panic!("expected an object schema") };

        assert_eq!(object.name(), Some("Outer"));
        let names: Vec<_> = object.fields().iter().map(Field::name).collect();
        assert_eq!(names, ["id", "count", "ratio", "inner", "items", "note", "extra"]);

        assert_eq!(schema.field("id"), Some(&Schema::String));
        assert_eq!(schema.field("count").map(Schema::kind), Some("integer"));
        assert_eq!(schema.field("inner"), Some(&Schema::Ref("Inner")));
        assert_eq!(schema.field("items"), Some(&Schema::Array(Box::new(Schema::Ref("Inner")))));
        assert_eq!(schema.field("extra"), Some(&Schema::Map(Box::new(Schema::Integer))));
    }

    #[test]
    fn definitions_cover_nested_structs_once() {
        let mut definitions = Definitions::new();
        Outer::definitions(&mut definitions);

        let names: Vec<_> = definitions.keys().copied().collect();
        assert_eq!(names, ["Outer", "Inner"]);
        assert_eq!(definitions["Inner"].fields()[0].schema(), &Schema::Boolean);
    }

    describe! {
        #[allow(dead_code, reason = "only the schema is inspected")]
        struct Node {
            label: String,
            children: Vec<Node>,
            parent: Option<Box<Node>>,
        }
    }

    #[test]
    fn self_referencing_struct_terminates() {
        let schema = Node::schema();
        assert_eq!(schema.field("children"), Some(&Schema::Array(Box::new(Schema::Ref("Node")))));
        assert_eq!(schema.field("parent"), Some(&Schema::Optional(Box::new(Schema::Ref("Node")))));

        let mut definitions = Definitions::new();
        Vec::<Node>::definitions(&mut definitions);
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions["Node"].name(), Some("Node"));
    }

    #[test]
    fn optional_fields_are_not_required() {
        let Schema::Object(object) = Outer::schema() else { panic!("expected an object schema") };
        let required: Vec<_> = object.fields().iter().filter(|f| f.is_required()).map(Field::name).collect();
        assert!(!required.contains(&"note"));
        assert!(required.contains(&"id"));
    }
}

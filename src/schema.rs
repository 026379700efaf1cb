//! Static structure descriptors driving the evaluator's walk.
//!
//! Rust has no runtime reflection, so every evaluable type exposes a
//! [`Schema`]: an ordered tree of field names, raw tags and conversion
//! hooks. Leaves and standard containers are covered here; struct schemas
//! are generated next to the struct definition by [`el_struct!`](crate::el_struct).

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Converts an interpreter result through a concrete Rust type, normalizing
/// it on success. The error is a plain message, reported under the field's
/// path name.
pub type Converter = fn(Value) -> Result<Value, String>;

/// Produces the zero value of a field's type, used when an expression
/// evaluates to null.
pub type ZeroFn = fn() -> Value;

/// Descriptor tree for one type.
#[derive(Debug, Clone)]
pub enum Schema {
    Struct(StructSchema),
    /// Sequence (`Vec<T>`, `[T; N]`); elements are traversed, never stored
    /// into directly.
    Seq(Box<Schema>),
    /// String-keyed map; values are traversed like sequence elements.
    Map(Box<Schema>),
    /// Pointer-like indirection; `null` shadows are skipped.
    Optional(Box<Schema>),
    Leaf(&'static str),
}

#[derive(Debug, Clone)]
pub struct StructSchema {
    pub type_name: &'static str,
    pub fields: Vec<FieldSchema>,
}

/// One declared member field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    /// Raw annotation text, handed to the scanner per walk.
    pub tag: &'static str,
    pub store: Converter,
    pub zero: ZeroFn,
    pub schema: Schema,
}

impl Schema {
    /// The struct descriptor behind pointer-like wrappers, if any.
    pub fn as_struct(&self) -> Option<&StructSchema> {
        match self {
            Schema::Struct(s) => Some(s),
            Schema::Optional(inner) => inner.as_struct(),
            _ => None,
        }
    }
}

/// Types the evaluator can walk. Implemented for leaves and containers
/// below; `el_struct!` generates impls for annotated structs.
pub trait Evaluable: Serialize + DeserializeOwned {
    fn schema() -> Schema;
}

/// Normalize `value` through `T`: deserialize, then serialize back.
pub fn convert_through<T: Serialize + DeserializeOwned>(value: Value) -> Result<Value, String> {
    let typed: T = serde_json::from_value(value)
        .map_err(|e| format!("into {}: {}", std::any::type_name::<T>(), e))?;
    serde_json::to_value(&typed).map_err(|e| e.to_string())
}

pub fn zero_of<T: Default + Serialize>() -> Value {
    serde_json::to_value(T::default()).unwrap_or(Value::Null)
}

macro_rules! leaf_evaluable {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Evaluable for $ty {
                fn schema() -> Schema {
                    Schema::Leaf(std::any::type_name::<$ty>())
                }
            }
        )*
    };
}

leaf_evaluable!(
    String, bool, char, i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64, Value,
);

impl<T: Evaluable> Evaluable for Vec<T> {
    fn schema() -> Schema {
        Schema::Seq(Box::new(T::schema()))
    }
}

impl<T: Evaluable, const N: usize> Evaluable for [T; N]
where
    [T; N]: Serialize + DeserializeOwned,
{
    fn schema() -> Schema {
        Schema::Seq(Box::new(T::schema()))
    }
}

impl<T: Evaluable> Evaluable for Option<T> {
    fn schema() -> Schema {
        Schema::Optional(Box::new(T::schema()))
    }
}

impl<T: Evaluable> Evaluable for Box<T> {
    fn schema() -> Schema {
        T::schema()
    }
}

impl<K, V, S> Evaluable for HashMap<K, V, S>
where
    V: Evaluable,
    HashMap<K, V, S>: Serialize + DeserializeOwned,
{
    fn schema() -> Schema {
        Schema::Map(Box::new(V::schema()))
    }
}

impl<K, V> Evaluable for BTreeMap<K, V>
where
    V: Evaluable,
    BTreeMap<K, V>: Serialize + DeserializeOwned,
{
    fn schema() -> Schema {
        Schema::Map(Box::new(V::schema()))
    }
}

/// Defines a struct and its [`Evaluable`] impl in one go. Append
/// `=> "tag text"` to a field to annotate it; serde derives are added
/// automatically, everything else passes through:
///
/// ```
/// tagel::el_struct! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Sample {
///         pub greeting: String => r#"eval:"upper(tags.arg)" arg:"hello""#,
///         pub count: i64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! el_struct {
    (
        $(#[$smeta:meta])*
        $svis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $fty:ty $(=> $tag:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$smeta])*
        #[derive(::serde::Serialize, ::serde::Deserialize)]
        $svis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $fname: $fty,
            )*
        }

        impl $crate::schema::Evaluable for $name {
            fn schema() -> $crate::schema::Schema {
                $crate::schema::Schema::Struct($crate::schema::StructSchema {
                    type_name: stringify!($name),
                    fields: vec![
                        $(
                            $crate::schema::FieldSchema {
                                name: stringify!($fname),
                                tag: $crate::el_struct!(@tag $($tag)?),
                                store: $crate::schema::convert_through::<$fty>,
                                zero: $crate::schema::zero_of::<$fty>,
                                schema: <$fty as $crate::schema::Evaluable>::schema(),
                            },
                        )*
                    ],
                })
            }
        }
    };
    (@tag $tag:literal) => { $tag };
    (@tag) => { "" };
}

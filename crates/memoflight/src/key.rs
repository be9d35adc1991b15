// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Call keys built from positional and named arguments.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

/// A single argument value that can take part in a call key.
///
/// Every variant supports structural equality, hashing and ordering. Floating point values are
/// not representable because they lack a total equality; encode them as bits or as text if a
/// call needs them.
///
/// # Examples
///
/// ```
/// use memoflight::ArgValue;
///
/// assert_eq!(ArgValue::from(10), ArgValue::Int(10));
/// assert_eq!(ArgValue::from("val_a"), ArgValue::Str("val_a".to_string()));
/// assert_eq!(ArgValue::from(None::<i64>), ArgValue::Unit);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgValue {
    /// The absence of a value.
    Unit,
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A string.
    Str(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// An ordered sequence of values.
    List(Vec<Self>),
}

impl Display for ArgValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Bytes(value) => write!(f, "b{value:?}"),
            Self::List(values) => {
                f.write_str("[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for ArgValue {
                fn from(value: $source) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from_int!(Int as i64: i8, i16, i32, i64);
impl_from_int!(UInt as u64: u8, u16, u32, u64);

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(values: Vec<ArgValue>) -> Self {
        Self::List(values)
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unit, Into::into)
    }
}

/// The arguments of one call, usable as a call key.
///
/// Positional arguments keep their call order. Named arguments are kept sorted by name, so two
/// calls that only differ in the textual order of their named arguments produce equal keys.
/// Naming the same argument twice keeps the last value.
///
/// # Examples
///
/// ```
/// use memoflight::CallArgs;
///
/// let left = CallArgs::new().arg(10).arg(20).named("a", "val_a").named("b", "val_b");
/// let right = CallArgs::new().arg(10).arg(20).named("b", "val_b").named("a", "val_a");
/// assert_eq!(left, right);
///
/// let swapped = CallArgs::new().arg(20).arg(10).named("a", "val_a").named("b", "val_b");
/// assert_ne!(left, swapped);
///
/// assert_eq!(left.to_string(), r#"(10, 20, a="val_a", b="val_b")"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallArgs {
    positional: Vec<ArgValue>,
    named: BTreeMap<String, ArgValue>,
}

impl CallArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgValue>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a named argument, replacing any earlier value with the same name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    /// Returns the positional arguments in call order.
    #[must_use]
    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    /// Returns the named arguments, sorted by name.
    pub fn named_args(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.named.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the positional argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.positional.get(index)
    }

    /// Returns the named argument called `name`.
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<&ArgValue> {
        self.named.get(name)
    }

    /// Total number of arguments, positional and named.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Returns `true` if there are no arguments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl Display for CallArgs {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        let mut first = true;
        for value in &self.positional {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{value}")?;
        }
        for (name, value) in &self.named {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use super::*;

    fn hash_of(args: &CallArgs) -> u64 {
        ahash::RandomState::with_seeds(1, 2, 3, 4).hash_one(args)
    }

    #[test]
    fn named_order_does_not_matter() {
        let left = CallArgs::new().arg(10).named("a", "val_a").named("b", "val_b");
        let right = CallArgs::new().arg(10).named("b", "val_b").named("a", "val_a");

        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
    }

    #[test]
    fn positional_order_matters() {
        let left = CallArgs::new().arg(10).arg(20);
        let right = CallArgs::new().arg(20).arg(10);

        assert_ne!(left, right);
    }

    #[test]
    fn positional_and_named_are_distinct() {
        let positional = CallArgs::new().arg("x");
        let named = CallArgs::new().named("0", "x");

        assert_ne!(positional, named);
    }

    #[test]
    fn repeated_name_keeps_last_value() {
        let args = CallArgs::new().named("b", "first").named("b", "second");

        assert_eq!(args.get_named("b"), Some(&ArgValue::from("second")));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn value_types_are_distinguished() {
        assert_ne!(CallArgs::new().arg(1_i64), CallArgs::new().arg(1_u64));
        assert_ne!(CallArgs::new().arg("1"), CallArgs::new().arg(1));
    }

    #[test]
    fn accessors() {
        let args = CallArgs::new().arg(10).arg(true).named("z", 1).named("a", vec![1_u8, 2]);

        assert_eq!(args.positional(), &[ArgValue::Int(10), ArgValue::Bool(true)]);
        assert_eq!(args.get(1), Some(&ArgValue::Bool(true)));
        assert_eq!(args.get(2), None);
        assert_eq!(args.get_named("missing"), None);
        let names: Vec<_> = args.named_args().map(|(name, _)| name).collect();
        assert_eq!(names, ["a", "z"]);
        assert_eq!(args.len(), 4);
        assert!(!args.is_empty());
        assert!(CallArgs::new().is_empty());
    }

    #[test]
    fn display() {
        let args = CallArgs::new()
            .arg(10)
            .arg(ArgValue::List(vec![1_i64.into(), "two".into()]))
            .arg(None::<u8>)
            .named("flag", false)
            .named("raw", vec![7_u8]);

        assert_eq!(args.to_string(), r#"(10, [1, "two"], (), flag=false, raw=b[7])"#);
        assert_eq!(CallArgs::new().to_string(), "()");
        assert_eq!(CallArgs::new().named("only", 5_u32).to_string(), "(only=5)");
    }
}

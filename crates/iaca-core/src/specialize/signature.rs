//! Type signatures used to select and instantiate methods.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A declared or argument type: either the top type or a named concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeSpec {
    Any,
    Named(String),
}

impl TypeSpec {
    /// Shorthand for a named type.
    pub fn named(name: impl Into<String>) -> Self {
        TypeSpec::Named(name.into())
    }

    /// `self <: other`.
    pub fn is_subtype_of(&self, other: &TypeSpec) -> bool {
        matches!(other, TypeSpec::Any) || self == other
    }

    /// The most general type that is a subtype of both, if any.
    pub fn intersect(&self, other: &TypeSpec) -> Option<TypeSpec> {
        match (self, other) {
            (TypeSpec::Any, t) | (t, TypeSpec::Any) => Some(t.clone()),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    /// LLVM type an argument of this type is passed as.
    ///
    /// Abstract and unknown types are passed boxed.
    pub fn llvm_type(&self) -> &'static str {
        let TypeSpec::Named(name) = self else {
            return "ptr";
        };
        match name.as_str() {
            "Int8" | "UInt8" | "Bool" => "i8",
            "Int16" | "UInt16" => "i16",
            "Int32" | "UInt32" => "i32",
            "Int64" | "UInt64" => "i64",
            "Int128" | "UInt128" => "i128",
            "Float32" => "float",
            "Float64" => "double",
            _ => "ptr",
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Any => f.write_str("Any"),
            TypeSpec::Named(name) => f.write_str(name),
        }
    }
}

impl From<String> for TypeSpec {
    fn from(s: String) -> Self {
        match s.trim() {
            "Any" => TypeSpec::Any,
            other => TypeSpec::Named(other.to_string()),
        }
    }
}

impl From<&str> for TypeSpec {
    fn from(s: &str) -> Self {
        TypeSpec::from(s.to_string())
    }
}

impl From<TypeSpec> for String {
    fn from(t: TypeSpec) -> Self {
        t.to_string()
    }
}

/// A tuple of argument types, e.g. `(Int64, Float64)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub Vec<TypeSpec>);

impl Signature {
    pub fn new(types: impl IntoIterator<Item = TypeSpec>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn types(&self) -> &[TypeSpec] {
        &self.0
    }

    /// Positional subtyping; arities must agree.
    pub fn is_subtype_of(&self, other: &Signature) -> bool {
        self.len() == other.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.is_subtype_of(b))
    }

    /// Positional intersection, `None` if any position is disjoint.
    pub fn intersect(&self, other: &Signature) -> Option<Signature> {
        if self.len() != other.len() {
            return None;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.intersect(b))
            .collect::<Option<Vec<_>>>()
            .map(Signature)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, t) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{t}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for Signature {
    type Err = std::convert::Infallible;

    /// Parses `Int64,Float64` or `(Int64, Float64)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        Ok(Signature(
            inner
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(TypeSpec::from)
                .collect(),
        ))
    }
}

//! Atomic type parts
//!
//! An [`Atomic`] is one member of a union: a named scalar or special value,
//! a class-like name, a generic container with ordered type parameters, or
//! a shape with literal keys. Every part has a canonical string form (its
//! [`Display`] output) used as its identity inside a
//! [`Union`](crate::Union).

use std::collections::BTreeMap;
use std::fmt;

use crate::union::Union;

/// One member of a union type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atomic {
    /// `int`
    Int,
    /// `float`
    Float,
    /// `string`
    String,
    /// `bool`
    Bool,
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `void` (no value; folds into `null` when combined)
    Void,
    /// `mixed` (unknown; absorbs everything when combined)
    Mixed,
    /// `scalar` (any of int/float/string/bool)
    Scalar,
    /// `callable`
    Callable,
    /// `object` (any object, class unknown)
    Object,
    /// Placeholder for "no elements yet"; yields to any concrete part.
    Empty,
    /// Class, interface, or mixin name (also `self`/`static`/`$param`
    /// placeholders before substitution).
    Named(String),
    /// Container with ordered type parameters: `array<int, string>`.
    /// One parameter means the value type; two mean key then value.
    Generic { name: String, params: Vec<Union> },
    /// Container with known literal keys: `array{id: int, name: string}`.
    Shaped {
        name: String,
        fields: BTreeMap<String, Union>,
    },
}

impl Atomic {
    /// Maps a bare type name to its atomic part. Unrecognized names become
    /// class references.
    pub fn from_name(name: &str) -> Atomic {
        match name {
            "int" => Atomic::Int,
            "float" => Atomic::Float,
            "string" => Atomic::String,
            "bool" => Atomic::Bool,
            "true" => Atomic::True,
            "false" => Atomic::False,
            "null" => Atomic::Null,
            "void" => Atomic::Void,
            "mixed" => Atomic::Mixed,
            "scalar" => Atomic::Scalar,
            "callable" => Atomic::Callable,
            "object" => Atomic::Object,
            "empty" => Atomic::Empty,
            "array" | "iterable" => Atomic::Generic {
                name: name.to_string(),
                params: vec![Union::mixed(), Union::mixed()],
            },
            _ => Atomic::Named(name.to_string()),
        }
    }

    /// Canonical string identity, equal to the `Display` output.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// True for scalar parts (including the literal `true`/`false` and the
    /// `scalar` supertype).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Atomic::Int
                | Atomic::Float
                | Atomic::String
                | Atomic::Bool
                | Atomic::True
                | Atomic::False
                | Atomic::Scalar
        )
    }

    /// True for array containers, generic or shaped.
    pub fn is_array_like(&self) -> bool {
        match self {
            Atomic::Generic { name, .. } => name == "array" || name == "iterable",
            Atomic::Shaped { .. } => true,
            _ => false,
        }
    }

    /// True when the part is always truthy (objects and callables; arrays
    /// and scalars can be empty/zero at runtime).
    pub fn is_always_truthy(&self) -> bool {
        match self {
            Atomic::True | Atomic::Object | Atomic::Callable | Atomic::Named(_) => true,
            Atomic::Generic { name, .. } => name != "array" && name != "iterable",
            _ => false,
        }
    }

    /// The class name a member access on this part resolves against, if
    /// any.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Atomic::Named(name) => Some(name),
            Atomic::Generic { name, .. } if name != "array" && name != "iterable" => Some(name),
            _ => None,
        }
    }

    /// Key and value types when this part is iterated, or `None` when it
    /// cannot be.
    pub fn iterable_params(&self) -> Option<(Union, Union)> {
        match self {
            Atomic::Generic { name, params } if name == "array" || name == "iterable" => {
                match params.len() {
                    0 => Some((Union::mixed(), Union::mixed())),
                    1 => Some((
                        Union::from_parts(vec![Atomic::Int, Atomic::String]),
                        params[0].clone(),
                    )),
                    _ => Some((params[0].clone(), params[1].clone())),
                }
            }
            Atomic::Shaped { fields, .. } => {
                let value = if fields.is_empty() {
                    Union::of(Atomic::Empty)
                } else {
                    Union::from_parts(
                        fields
                            .values()
                            .flat_map(|u| u.parts().cloned())
                            .collect::<Vec<_>>(),
                    )
                };
                let key = if fields.keys().all(|k| k.parse::<i64>().is_ok()) {
                    Union::int()
                } else {
                    Union::string()
                };
                Some((key, value))
            }
            Atomic::Empty => Some((Union::of(Atomic::Empty), Union::of(Atomic::Empty))),
            _ => None,
        }
    }
}

impl fmt::Display for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atomic::Int => write!(f, "int"),
            Atomic::Float => write!(f, "float"),
            Atomic::String => write!(f, "string"),
            Atomic::Bool => write!(f, "bool"),
            Atomic::True => write!(f, "true"),
            Atomic::False => write!(f, "false"),
            Atomic::Null => write!(f, "null"),
            Atomic::Void => write!(f, "void"),
            Atomic::Mixed => write!(f, "mixed"),
            Atomic::Scalar => write!(f, "scalar"),
            Atomic::Callable => write!(f, "callable"),
            Atomic::Object => write!(f, "object"),
            Atomic::Empty => write!(f, "empty"),
            Atomic::Named(name) => write!(f, "{}", name),
            Atomic::Generic { name, params } => {
                write!(f, "{}<", name)?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ">")
            }
            Atomic::Shaped { name, fields } => {
                write!(f, "{}{{", name)?;
                for (i, (key, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, ty)?;
                }
                write!(f, "}}")
            }
        }
    }
}

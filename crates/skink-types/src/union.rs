//! Union types
//!
//! A [`Union`] is a set of [`Atomic`] parts keyed by canonical string form,
//! representing "one of these". Duplicates collapse on insertion and
//! iteration order is deterministic. A union is never observable empty:
//! constructors that could produce an empty set either fall back to `mixed`
//! or return `Option`.

use std::collections::BTreeMap;
use std::fmt;

use crate::atomic::Atomic;
use crate::combine;

/// A set of atomic parts representing "one of these types".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union {
    parts: BTreeMap<String, Atomic>,
}

impl Union {
    /// Single-part union.
    pub fn of(part: Atomic) -> Union {
        let mut parts = BTreeMap::new();
        parts.insert(part.key(), part);
        Union { parts }
    }

    /// Combines parts into a union; an empty input degrades to `mixed`.
    pub fn from_parts(parts: Vec<Atomic>) -> Union {
        combine::combine(parts)
    }

    pub(crate) fn from_map(parts: BTreeMap<String, Atomic>) -> Option<Union> {
        if parts.is_empty() {
            None
        } else {
            Some(Union { parts })
        }
    }

    // ===== Shortcuts =====

    pub fn int() -> Union {
        Union::of(Atomic::Int)
    }

    pub fn float() -> Union {
        Union::of(Atomic::Float)
    }

    pub fn string() -> Union {
        Union::of(Atomic::String)
    }

    pub fn bool() -> Union {
        Union::of(Atomic::Bool)
    }

    pub fn null() -> Union {
        Union::of(Atomic::Null)
    }

    pub fn void() -> Union {
        Union::of(Atomic::Void)
    }

    pub fn mixed() -> Union {
        Union::of(Atomic::Mixed)
    }

    pub fn named(name: &str) -> Union {
        Union::of(Atomic::Named(name.to_string()))
    }

    /// `array<key, value>`.
    pub fn array(key: Union, value: Union) -> Union {
        Union::of(Atomic::Generic {
            name: "array".to_string(),
            params: vec![key, value],
        })
    }

    /// `array<empty, empty>`: the type of `[]`.
    pub fn empty_array() -> Union {
        Union::array(Union::of(Atomic::Empty), Union::of(Atomic::Empty))
    }

    /// Adds `null` to this union.
    pub fn nullable(self) -> Union {
        self.combine_atomic(Atomic::Null)
    }

    // ===== Inspection =====

    pub fn parts(&self) -> impl Iterator<Item = &Atomic> {
        self.parts.values()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The only part, when the union has exactly one.
    pub fn as_single(&self) -> Option<&Atomic> {
        if self.parts.len() == 1 {
            self.parts.values().next()
        } else {
            None
        }
    }

    /// Whether a part with this canonical key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.parts.contains_key(key)
    }

    pub fn has_null(&self) -> bool {
        self.contains("null")
    }

    pub fn has_false(&self) -> bool {
        self.contains("false")
    }

    pub fn has_bool(&self) -> bool {
        self.contains("bool")
    }

    pub fn has_void(&self) -> bool {
        self.contains("void")
    }

    pub fn is_mixed(&self) -> bool {
        self.parts.len() == 1 && self.contains("mixed")
    }

    pub fn is_nullable(&self) -> bool {
        self.has_null() || self.has_void()
    }

    /// Whether every part is scalar.
    pub fn is_scalar_only(&self) -> bool {
        self.parts().all(|p| p.is_scalar())
    }

    /// Whether at least one part can be iterated.
    pub fn is_iterable(&self) -> bool {
        self.parts().any(|p| p.iterable_params().is_some())
    }

    // ===== Transformation =====

    /// Union of both sides' parts, with the combining rules applied.
    pub fn combine_with(&self, other: &Union) -> Union {
        combine::combine(
            self.parts()
                .cloned()
                .chain(other.parts().cloned())
                .collect::<Vec<_>>(),
        )
    }

    pub fn combine_atomic(&self, part: Atomic) -> Union {
        let mut parts: Vec<Atomic> = self.parts().cloned().collect();
        parts.push(part);
        combine::combine(parts)
    }

    /// Removes the part with this key; `None` when that would leave the
    /// union empty.
    pub fn without(&self, key: &str) -> Option<Union> {
        if !self.parts.contains_key(key) {
            return Some(self.clone());
        }
        let mut parts = self.parts.clone();
        parts.remove(key);
        Union::from_map(parts)
    }

    /// Keeps only parts satisfying the predicate; `None` when none do.
    pub fn retain(&self, keep: impl Fn(&Atomic) -> bool) -> Option<Union> {
        let parts: BTreeMap<String, Atomic> = self
            .parts
            .iter()
            .filter(|(_, p)| keep(p))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect();
        Union::from_map(parts)
    }

    /// Replaces every occurrence of a named part (recursively, through
    /// generic parameters and shape fields) with the replacement union.
    pub fn substitute(&self, name: &str, replacement: &Union) -> Union {
        let mut out: Vec<Atomic> = Vec::new();
        for part in self.parts() {
            match part {
                Atomic::Named(n) if n == name => {
                    out.extend(replacement.parts().cloned());
                }
                Atomic::Generic { name: g, params } => {
                    out.push(Atomic::Generic {
                        name: g.clone(),
                        params: params
                            .iter()
                            .map(|p| p.substitute(name, replacement))
                            .collect(),
                    });
                }
                Atomic::Shaped { name: s, fields } => {
                    out.push(Atomic::Shaped {
                        name: s.clone(),
                        fields: fields
                            .iter()
                            .map(|(k, v)| (k.clone(), v.substitute(name, replacement)))
                            .collect(),
                    });
                }
                other => out.push(other.clone()),
            }
        }
        combine::combine(out)
    }
}

impl fmt::Display for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.parts.keys().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let u = Union::from_parts(vec![Atomic::Int, Atomic::Int, Atomic::Null]);
        assert_eq!(u.len(), 2);
        assert_eq!(u.to_string(), "int|null");
    }

    #[test]
    fn test_without_refuses_to_empty() {
        let u = Union::null();
        assert!(u.without("null").is_none());
        let v = Union::int().nullable();
        assert_eq!(v.without("null").unwrap().to_string(), "int");
    }

    #[test]
    fn test_substitute_named() {
        let u = Union::named("self").nullable();
        let out = u.substitute("self", &Union::named("Account"));
        assert_eq!(out.to_string(), "Account|null");
    }

    #[test]
    fn test_substitute_inside_generic() {
        let u = Union::array(Union::int(), Union::named("T"));
        let out = u.substitute("T", &Union::string());
        assert_eq!(out.to_string(), "array<int, string>");
    }

    #[test]
    fn test_nullable_query() {
        assert!(Union::null().is_nullable());
        assert!(Union::void().is_nullable());
        assert!(!Union::int().is_nullable());
        assert!(Union::int().nullable().is_nullable());
    }
}

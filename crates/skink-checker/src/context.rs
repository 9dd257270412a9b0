//! Per-program-point environment
//!
//! A [`Context`] carries what is known at one point of the traversal: the
//! types of definitely-assigned variables, the set of possibly-assigned
//! ones, the enclosing class, and the narrowing facts currently in force.
//! Branches always run on clones; sibling branches never observe each
//! other's mutations, and the checker merges clones back explicitly.

use rustc_hash::{FxHashMap, FxHashSet};
use skink_types::Union;

use crate::reconciler::Assertion;

/// One narrowing fact in force: `var` currently satisfies `assertion`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub var: String,
    pub assertion: Assertion,
}

/// Variable types and definedness at one program point.
///
/// Invariant: every key of `vars_in_scope` is also in
/// `vars_possibly_in_scope`. Variable ids are full access paths with the
/// sigil: `$x`, `$this->prop`, `$row['id']`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Types of variables assigned on every path so far.
    pub vars_in_scope: FxHashMap<String, Union>,
    /// Variables assigned on at least one path so far.
    pub vars_possibly_in_scope: FxHashSet<String>,
    /// Class whose body is being analyzed, for `self`/`$this`.
    pub self_class: Option<String>,
    /// Parent of `self_class`, for `parent::`.
    pub parent_class: Option<String>,
    /// Whether the enclosing method is static.
    pub inside_static: bool,
    /// Narrowing facts currently in force.
    pub clauses: Vec<Clause>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Records an assignment: the variable is now definitely in scope.
    /// Narrowings and derived paths of it no longer hold.
    pub fn set_var(&mut self, id: &str, ty: Union) {
        let prefix_arrow = format!("{}->", id);
        let prefix_index = format!("{}[", id);
        self.vars_in_scope
            .retain(|k, _| !k.starts_with(&prefix_arrow) && !k.starts_with(&prefix_index));
        self.vars_possibly_in_scope
            .retain(|k| !k.starts_with(&prefix_arrow) && !k.starts_with(&prefix_index));
        self.vars_in_scope.insert(id.to_string(), ty);
        self.vars_possibly_in_scope.insert(id.to_string());
        self.clear_clauses_for(id);
    }

    /// Narrows a variable without invalidating its clauses.
    pub fn narrow_var(&mut self, id: &str, ty: Union) {
        self.vars_in_scope.insert(id.to_string(), ty);
        self.vars_possibly_in_scope.insert(id.to_string());
    }

    /// Removes a variable entirely (`unset`), including derived paths.
    pub fn remove_var(&mut self, id: &str) {
        self.vars_in_scope.remove(id);
        self.vars_possibly_in_scope.remove(id);
        let prefix_arrow = format!("{}->", id);
        let prefix_index = format!("{}[", id);
        self.vars_in_scope
            .retain(|k, _| !k.starts_with(&prefix_arrow) && !k.starts_with(&prefix_index));
        self.vars_possibly_in_scope
            .retain(|k| !k.starts_with(&prefix_arrow) && !k.starts_with(&prefix_index));
        self.clear_clauses_for(id);
    }

    pub fn has_var(&self, id: &str) -> bool {
        self.vars_in_scope.contains_key(id)
    }

    pub fn var_type(&self, id: &str) -> Option<&Union> {
        self.vars_in_scope.get(id)
    }

    pub fn is_possibly_defined(&self, id: &str) -> bool {
        self.vars_possibly_in_scope.contains(id)
    }

    // ===== Clauses =====

    pub fn add_clause(&mut self, var: &str, assertion: Assertion) {
        self.clauses.push(Clause {
            var: var.to_string(),
            assertion,
        });
    }

    /// Whether this exact fact is already in force.
    pub fn implies(&self, var: &str, assertion: &Assertion) -> bool {
        self.clauses
            .iter()
            .any(|c| c.var == var && &c.assertion == assertion)
    }

    /// Drops facts about a variable (used when it is reassigned).
    pub fn clear_clauses_for(&mut self, var: &str) {
        self.clauses.retain(|c| c.var != var);
    }

    // ===== Merging support =====

    /// Propagates another context's assignments as possibly-defined,
    /// regardless of how that context's branch exited.
    pub fn absorb_possibly_defined(&mut self, other: &Context) {
        for id in &other.vars_possibly_in_scope {
            self.vars_possibly_in_scope.insert(id.clone());
        }
        for id in other.vars_in_scope.keys() {
            self.vars_possibly_in_scope.insert(id.clone());
        }
    }

    /// Ids assigned here that the given parent context does not know as
    /// definite.
    pub fn newly_defined_vs(&self, parent: &Context) -> Vec<String> {
        self.vars_in_scope
            .keys()
            .filter(|k| !parent.vars_in_scope.contains_key(*k))
            .cloned()
            .collect()
    }
}

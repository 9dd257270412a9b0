//! Class and function registry
//!
//! Holds everything the checker knows about declared symbols: classes with
//! their inheritance-resolved members, free functions, and builtin symbols
//! surfaced through a [`Reflection`] provider.
//!
//! Classes register lazily. A declaration is queued when its statement is
//! visited and only resolved into a [`ClassRecord`] when something first
//! refers to it, parents first. The `registering` set catches `extends`
//! cycles during that recursion.
//!
//! Method records are stored once under their declaring class, keyed
//! `"Class::method"`. Inheriting classes link to the declaring record via
//! `declaring_method`, so an override replaces one link rather than a copy
//! of the record. Mixin members are the exception: they are re-declared
//! under each consuming class, which is what makes their private members
//! usable from the consumer.

use rustc_hash::{FxHashMap, FxHashSet};
use skink_ast::{ClassDecl, ClassKind, Span, Visibility};
use skink_types::Union;

use crate::issues::IssueKind;

pub mod callmap;
pub mod reflection;

pub use callmap::{call_map_entry, CallMapEntry, SpecialCase};
pub use reflection::{BuiltinClass, CoreReflection, Reflection};

/// Builds the `"Class::method"` key used throughout the registry.
pub fn method_id(class: &str, method: &str) -> String {
    format!("{}::{}", class, method)
}

/// A fully registered class with inherited members copied down.
#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub name: String,
    pub kind: ClassKind,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub mixins: Vec<String>,
    /// Instance properties, own and inherited.
    pub instance_properties: FxHashMap<String, PropertyRecord>,
    /// Static properties, own and inherited.
    pub static_properties: FxHashMap<String, PropertyRecord>,
    /// Class constants, own and inherited (interfaces included).
    pub constants: FxHashMap<String, Union>,
    /// Names of all methods callable on this class.
    pub methods: Vec<String>,
    pub is_builtin: bool,
}

impl ClassRecord {
    pub fn new(name: &str, kind: ClassKind) -> ClassRecord {
        ClassRecord {
            name: name.to_string(),
            kind,
            parent: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
            instance_properties: FxHashMap::default(),
            static_properties: FxHashMap::default(),
            constants: FxHashMap::default(),
            methods: Vec::new(),
            is_builtin: false,
        }
    }
}

/// A property as seen from some class, remembering where it was declared.
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub visibility: Visibility,
    pub ty: Union,
    pub declaring_class: String,
}

/// A method signature stored under its declaring class.
#[derive(Debug, Clone)]
pub struct MethodRecord {
    pub declaring_class: String,
    pub name: String,
    pub params: Vec<ParamRecord>,
    /// Declared (or docblock) return type, if any.
    pub return_type: Option<Union>,
    /// Return type inferred from the body, filled in after checking.
    pub inferred_return: Option<Union>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    pub deprecated: bool,
    /// Issue kinds suppressed on this method's body.
    pub suppressed: Vec<IssueKind>,
}

/// A free function signature.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub name: String,
    pub params: Vec<ParamRecord>,
    pub return_type: Option<Union>,
    pub inferred_return: Option<Union>,
    pub deprecated: bool,
    pub suppressed: Vec<IssueKind>,
}

/// One parameter of a function or method signature.
#[derive(Debug, Clone)]
pub struct ParamRecord {
    pub name: String,
    pub ty: Option<Union>,
    pub by_ref: bool,
    /// Has a default, so callers may omit it.
    pub optional: bool,
    pub variadic: bool,
}

/// Result of resolving a class name against known classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassLookup {
    /// Known under exactly this name.
    Found(String),
    /// Known, but declared with different casing.
    WrongCase(String),
    Missing,
}

/// The symbol registry for one analysis run.
pub struct Registry {
    classes: FxHashMap<String, ClassRecord>,
    /// Lowercased name to canonical casing, pending classes included.
    class_casing: FxHashMap<String, String>,
    /// Declarations seen but not yet resolved into records.
    pending_classes: FxHashMap<String, ClassDecl>,
    /// Classes currently mid-registration, for cycle detection.
    registering: FxHashSet<String>,
    functions: FxHashMap<String, FunctionRecord>,
    /// Method records keyed by declaring `"Class::method"` id.
    methods: FxHashMap<String, MethodRecord>,
    /// `"Class::method"` as callable to the declaring id.
    declaring_method: FxHashMap<String, String>,
    /// Call sites seen this run, keyed by declaring method id.
    invocations: FxHashMap<String, Vec<(String, Span)>>,
    reflection: Box<dyn Reflection>,
}

impl Registry {
    /// Create a registry backed by the core builtin set.
    pub fn new() -> Registry {
        Registry::with_reflection(Box::new(CoreReflection::default()))
    }

    /// Create a registry with a custom builtin provider.
    pub fn with_reflection(reflection: Box<dyn Reflection>) -> Registry {
        Registry {
            classes: FxHashMap::default(),
            class_casing: FxHashMap::default(),
            pending_classes: FxHashMap::default(),
            registering: FxHashSet::default(),
            functions: FxHashMap::default(),
            methods: FxHashMap::default(),
            declaring_method: FxHashMap::default(),
            invocations: FxHashMap::default(),
            reflection,
        }
    }

    // ===== Classes =====

    /// Queue a class declaration for lazy registration.
    ///
    /// Returns false if the name is already taken.
    pub fn queue_class(&mut self, decl: ClassDecl) -> bool {
        if self.classes.contains_key(&decl.name) || self.pending_classes.contains_key(&decl.name) {
            return false;
        }
        self.class_casing
            .insert(decl.name.to_lowercase(), decl.name.clone());
        self.pending_classes.insert(decl.name.clone(), decl);
        true
    }

    /// Resolve a referenced class name against queued and registered
    /// classes, case-insensitively.
    pub fn resolve_class_name(&self, name: &str) -> ClassLookup {
        if self.classes.contains_key(name) || self.pending_classes.contains_key(name) {
            return ClassLookup::Found(name.to_string());
        }
        // The casing map also covers classes mid-registration (taken from
        // pending, not yet committed), which must resolve as found.
        match self.class_casing.get(&name.to_lowercase()) {
            Some(canonical) if canonical == name => ClassLookup::Found(canonical.clone()),
            Some(canonical) => ClassLookup::WrongCase(canonical.clone()),
            None => ClassLookup::Missing,
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending_classes.contains_key(name)
    }

    /// Names of classes queued but not yet registered.
    pub fn pending_names(&self) -> Vec<String> {
        self.pending_classes.keys().cloned().collect()
    }

    pub fn take_pending(&mut self, name: &str) -> Option<ClassDecl> {
        self.pending_classes.remove(name)
    }

    /// Mark a class as mid-registration. Returns false when it already is,
    /// which means the hierarchy is cyclic.
    pub fn mark_registering(&mut self, name: &str) -> bool {
        self.registering.insert(name.to_string())
    }

    pub fn unmark_registering(&mut self, name: &str) {
        self.registering.remove(name);
    }

    /// Insert a resolved class, copying down inherited members.
    ///
    /// Precedence is own members, then mixins, then the parent. Interfaces
    /// contribute constants (and, for interfaces extending interfaces,
    /// method signatures). Parents, interfaces, and mixins must already be
    /// registered.
    pub fn commit_class(&mut self, mut record: ClassRecord, own_methods: Vec<MethodRecord>) {
        let class_name = record.name.clone();

        for method in own_methods {
            let id = method_id(&class_name, &method.name);
            if !record.methods.contains(&method.name) {
                record.methods.push(method.name.clone());
            }
            self.declaring_method.insert(id.clone(), id.clone());
            self.methods.insert(id, method);
        }

        for mixin_name in record.mixins.clone() {
            self.copy_mixin_members(&mut record, &mixin_name);
        }

        if let Some(parent_name) = record.parent.clone() {
            self.copy_ancestor_members(&mut record, &parent_name);
        }
        if record.kind == ClassKind::Interface {
            // Interface extension works like single-parent inheritance,
            // repeated per extended interface.
            for iface_name in record.interfaces.clone() {
                self.copy_ancestor_members(&mut record, &iface_name);
            }
        } else {
            for iface_name in record.interfaces.clone() {
                if let Some(iface) = self.classes.get(&iface_name) {
                    let constants: Vec<(String, Union)> = iface
                        .constants
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    for (name, ty) in constants {
                        record.constants.entry(name).or_insert(ty);
                    }
                }
            }
        }

        self.class_casing
            .insert(class_name.to_lowercase(), class_name.clone());
        self.classes.insert(class_name, record);
    }

    /// Re-declare a mixin's members under the consuming class.
    fn copy_mixin_members(&mut self, record: &mut ClassRecord, mixin_name: &str) {
        let Some(mixin) = self.classes.get(mixin_name) else {
            return;
        };
        let method_names = mixin.methods.clone();
        let instance_props: Vec<(String, PropertyRecord)> = mixin
            .instance_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let static_props: Vec<(String, PropertyRecord)> = mixin
            .static_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let constants: Vec<(String, Union)> = mixin
            .constants
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for name in method_names {
            let id = method_id(&record.name, &name);
            if self.declaring_method.contains_key(&id) {
                continue;
            }
            let Some((_, declared)) = self.method_on(mixin_name, &name) else {
                continue;
            };
            let mut copied = declared.clone();
            copied.declaring_class = record.name.clone();
            self.declaring_method.insert(id.clone(), id.clone());
            self.methods.insert(id, copied);
            if !record.methods.contains(&name) {
                record.methods.push(name);
            }
        }
        for (name, prop) in instance_props {
            let declaring = record.name.clone();
            record.instance_properties.entry(name).or_insert_with(|| PropertyRecord {
                declaring_class: declaring,
                ..prop
            });
        }
        for (name, prop) in static_props {
            let declaring = record.name.clone();
            record.static_properties.entry(name).or_insert_with(|| PropertyRecord {
                declaring_class: declaring,
                ..prop
            });
        }
        for (name, ty) in constants {
            record.constants.entry(name).or_insert(ty);
        }
    }

    /// Link an ancestor's members into a record without re-declaring them.
    fn copy_ancestor_members(&mut self, record: &mut ClassRecord, ancestor_name: &str) {
        let Some(ancestor) = self.classes.get(ancestor_name) else {
            return;
        };
        let method_names = ancestor.methods.clone();
        let instance_props: Vec<(String, PropertyRecord)> = ancestor
            .instance_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let static_props: Vec<(String, PropertyRecord)> = ancestor
            .static_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let constants: Vec<(String, Union)> = ancestor
            .constants
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for name in method_names {
            let child_id = method_id(&record.name, &name);
            if self.declaring_method.contains_key(&child_id) {
                continue;
            }
            if let Some(declaring) = self
                .declaring_method
                .get(&method_id(ancestor_name, &name))
                .cloned()
            {
                self.declaring_method.insert(child_id, declaring);
                if !record.methods.contains(&name) {
                    record.methods.push(name);
                }
            }
        }
        for (name, prop) in instance_props {
            record.instance_properties.entry(name).or_insert(prop);
        }
        for (name, prop) in static_props {
            record.static_properties.entry(name).or_insert(prop);
        }
        for (name, ty) in constants {
            record.constants.entry(name).or_insert(ty);
        }
    }

    pub fn class(&self, name: &str) -> Option<&ClassRecord> {
        self.classes.get(name)
    }

    /// Whether `ancestor` appears in `descendant`'s parent or interface
    /// chain. Not reflexive.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = vec![descendant];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(record) = self.classes.get(current) else {
                continue;
            };
            if let Some(parent) = record.parent.as_deref() {
                if parent == ancestor {
                    return true;
                }
                stack.push(parent);
            }
            for iface in &record.interfaces {
                if iface == ancestor {
                    return true;
                }
                stack.push(iface);
            }
        }
        false
    }

    /// Visibility check for a member declared on `declaring_class`, seen
    /// from code inside `calling_class` (None for top-level code). Mixin
    /// bodies skip the check, their consumer is unknown until use.
    pub fn can_access(
        &self,
        visibility: Visibility,
        declaring_class: &str,
        calling_class: Option<&str>,
        in_mixin: bool,
    ) -> bool {
        match visibility {
            Visibility::Public => true,
            _ if in_mixin => true,
            Visibility::Private => calling_class == Some(declaring_class),
            Visibility::Protected => match calling_class {
                Some(calling) => {
                    calling == declaring_class
                        || self.is_ancestor(declaring_class, calling)
                        || self.is_ancestor(calling, declaring_class)
                }
                None => false,
            },
        }
    }

    // ===== Methods =====

    pub fn method(&self, id: &str) -> Option<&MethodRecord> {
        self.methods.get(id)
    }

    pub fn method_mut(&mut self, id: &str) -> Option<&mut MethodRecord> {
        self.methods.get_mut(id)
    }

    /// Look up a method as callable on `class`, following inheritance
    /// links. Returns the declaring id alongside the record.
    pub fn method_on(&self, class: &str, method: &str) -> Option<(String, &MethodRecord)> {
        let declaring = self.declaring_method.get(&method_id(class, method))?;
        let record = self.methods.get(declaring)?;
        Some((declaring.clone(), record))
    }

    pub fn set_inferred_return(&mut self, id: &str, ty: Union) {
        if let Some(method) = self.methods.get_mut(id) {
            method.inferred_return = Some(ty);
        }
    }

    pub fn record_invocation(&mut self, id: &str, file: &str, span: Span) {
        self.invocations
            .entry(id.to_string())
            .or_default()
            .push((file.to_string(), span));
    }

    pub fn invocations_of(&self, id: &str) -> &[(String, Span)] {
        self.invocations.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ===== Properties and constants =====

    pub fn property_on(&self, class: &str, name: &str) -> Option<&PropertyRecord> {
        self.classes.get(class)?.instance_properties.get(name)
    }

    pub fn static_property_on(&self, class: &str, name: &str) -> Option<&PropertyRecord> {
        self.classes.get(class)?.static_properties.get(name)
    }

    pub fn constant_on(&self, class: &str, name: &str) -> Option<&Union> {
        self.classes.get(class)?.constants.get(name)
    }

    // ===== Functions =====

    /// Register a free function. Returns false if the name is taken.
    pub fn register_function(&mut self, record: FunctionRecord) -> bool {
        if self.functions.contains_key(&record.name) {
            return false;
        }
        self.functions.insert(record.name.clone(), record);
        true
    }

    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.get(name)
    }

    pub fn set_inferred_function_return(&mut self, name: &str, ty: Union) {
        if let Some(function) = self.functions.get_mut(name) {
            function.inferred_return = Some(ty);
        }
    }

    // ===== Builtins =====

    /// Load a builtin class through reflection, parents first.
    pub fn load_builtin_class(&mut self, name: &str) -> Option<String> {
        if self.classes.contains_key(name) {
            return Some(name.to_string());
        }
        let builtin = self.reflection.class(name)?;
        if let Some(parent) = builtin.record.parent.clone() {
            self.load_builtin_class(&parent);
        }
        let canonical = builtin.record.name.clone();
        self.commit_class(builtin.record, builtin.methods);
        Some(canonical)
    }

    /// Look up a builtin function through reflection, caching the record.
    pub fn builtin_function(&mut self, name: &str) -> Option<&FunctionRecord> {
        if !self.functions.contains_key(name) {
            let record = self.reflection.function(name)?;
            self.functions.insert(name.to_string(), record);
        }
        self.functions.get(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: &str, name: &str, visibility: Visibility) -> MethodRecord {
        MethodRecord {
            declaring_class: class.to_string(),
            name: name.to_string(),
            params: Vec::new(),
            return_type: None,
            inferred_return: None,
            visibility,
            is_static: false,
            is_abstract: false,
            deprecated: false,
            suppressed: Vec::new(),
        }
    }

    #[test]
    fn test_commit_and_lookup() {
        let mut registry = Registry::new();
        let record = ClassRecord::new("Foo", ClassKind::Class);
        registry.commit_class(record, vec![method("Foo", "bar", Visibility::Public)]);

        let (declaring, found) = registry.method_on("Foo", "bar").unwrap();
        assert_eq!(declaring, "Foo::bar");
        assert_eq!(found.declaring_class, "Foo");
    }

    #[test]
    fn test_parent_method_linked_not_copied() {
        let mut registry = Registry::new();
        registry.commit_class(
            ClassRecord::new("Base", ClassKind::Class),
            vec![method("Base", "run", Visibility::Public)],
        );
        let mut child = ClassRecord::new("Child", ClassKind::Class);
        child.parent = Some("Base".to_string());
        registry.commit_class(child, vec![]);

        let (declaring, _) = registry.method_on("Child", "run").unwrap();
        assert_eq!(declaring, "Base::run");
        assert!(registry.class("Child").unwrap().methods.contains(&"run".to_string()));
    }

    #[test]
    fn test_override_shadows_parent() {
        let mut registry = Registry::new();
        registry.commit_class(
            ClassRecord::new("Base", ClassKind::Class),
            vec![method("Base", "run", Visibility::Public)],
        );
        let mut child = ClassRecord::new("Child", ClassKind::Class);
        child.parent = Some("Base".to_string());
        registry.commit_class(child, vec![method("Child", "run", Visibility::Public)]);

        let (declaring, _) = registry.method_on("Child", "run").unwrap();
        assert_eq!(declaring, "Child::run");
    }

    #[test]
    fn test_mixin_methods_redeclared_under_consumer() {
        let mut registry = Registry::new();
        registry.commit_class(
            ClassRecord::new("Greets", ClassKind::Mixin),
            vec![method("Greets", "greet", Visibility::Private)],
        );
        let mut user = ClassRecord::new("User", ClassKind::Class);
        user.mixins.push("Greets".to_string());
        registry.commit_class(user, vec![]);

        let (declaring, found) = registry.method_on("User", "greet").unwrap();
        assert_eq!(declaring, "User::greet");
        assert_eq!(found.declaring_class, "User");
        // Private, but declared on User itself, so User code may call it.
        assert!(registry.can_access(Visibility::Private, "User", Some("User"), false));
    }

    #[test]
    fn test_wrong_case_resolution() {
        let mut registry = Registry::new();
        registry.commit_class(ClassRecord::new("FooBar", ClassKind::Class), vec![]);

        assert_eq!(
            registry.resolve_class_name("FooBar"),
            ClassLookup::Found("FooBar".to_string())
        );
        assert_eq!(
            registry.resolve_class_name("foobar"),
            ClassLookup::WrongCase("FooBar".to_string())
        );
        assert_eq!(registry.resolve_class_name("Baz"), ClassLookup::Missing);
    }

    #[test]
    fn test_registering_cycle_detected() {
        let mut registry = Registry::new();
        assert!(registry.mark_registering("A"));
        assert!(!registry.mark_registering("A"));
        registry.unmark_registering("A");
        assert!(registry.mark_registering("A"));
    }

    #[test]
    fn test_is_ancestor_walks_chain() {
        let mut registry = Registry::new();
        registry.commit_class(ClassRecord::new("A", ClassKind::Class), vec![]);
        let mut b = ClassRecord::new("B", ClassKind::Class);
        b.parent = Some("A".to_string());
        registry.commit_class(b, vec![]);
        let mut c = ClassRecord::new("C", ClassKind::Class);
        c.parent = Some("B".to_string());
        registry.commit_class(c, vec![]);

        assert!(registry.is_ancestor("A", "C"));
        assert!(registry.is_ancestor("B", "C"));
        assert!(!registry.is_ancestor("C", "A"));
        assert!(!registry.is_ancestor("A", "A"));
    }

    #[test]
    fn test_is_ancestor_through_interface() {
        let mut registry = Registry::new();
        registry.commit_class(ClassRecord::new("Countable", ClassKind::Interface), vec![]);
        let mut bag = ClassRecord::new("Bag", ClassKind::Class);
        bag.interfaces.push("Countable".to_string());
        registry.commit_class(bag, vec![]);

        assert!(registry.is_ancestor("Countable", "Bag"));
    }

    #[test]
    fn test_can_access_visibility() {
        let mut registry = Registry::new();
        registry.commit_class(ClassRecord::new("Base", ClassKind::Class), vec![]);
        let mut child = ClassRecord::new("Child", ClassKind::Class);
        child.parent = Some("Base".to_string());
        registry.commit_class(child, vec![]);
        let mut sibling = ClassRecord::new("Sibling", ClassKind::Class);
        sibling.parent = Some("Base".to_string());
        registry.commit_class(sibling, vec![]);

        assert!(registry.can_access(Visibility::Private, "Base", Some("Base"), false));
        assert!(!registry.can_access(Visibility::Private, "Base", Some("Child"), false));
        assert!(!registry.can_access(Visibility::Private, "Base", None, false));

        // Protected reaches down to subclasses of the declaring class.
        assert!(registry.can_access(Visibility::Protected, "Base", Some("Child"), false));
        assert!(registry.can_access(Visibility::Protected, "Base", Some("Sibling"), false));
        assert!(!registry.can_access(Visibility::Protected, "Base", Some("Unrelated"), false));
        assert!(!registry.can_access(Visibility::Protected, "Base", None, false));

        assert!(registry.can_access(Visibility::Public, "Base", None, false));
        // Mixin bodies are exempt from access checks.
        assert!(registry.can_access(Visibility::Private, "Base", Some("Other"), true));
    }

    #[test]
    fn test_duplicate_function_rejected() {
        let mut registry = Registry::new();
        let record = FunctionRecord {
            name: "foo".to_string(),
            params: Vec::new(),
            return_type: None,
            inferred_return: None,
            deprecated: false,
            suppressed: Vec::new(),
        };
        assert!(registry.register_function(record.clone()));
        assert!(!registry.register_function(record));
    }

    #[test]
    fn test_builtin_exception_loads() {
        let mut registry = Registry::new();
        let canonical = registry.load_builtin_class("Exception").unwrap();
        assert_eq!(canonical, "Exception");
        assert!(registry.class("Exception").unwrap().is_builtin);
        let (_, get_message) = registry.method_on("Exception", "getMessage").unwrap();
        assert_eq!(
            get_message.return_type.as_ref().map(|t| t.to_string()),
            Some("string".to_string())
        );
    }
}

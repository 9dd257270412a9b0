//! Integration tests for class registration, inheritance, and visibility

use skink_ast::{AstBuilder, DocBlock, Visibility};
use skink_checker::{analyze, Config, IssueKind, Registry, Severity};

#[test]
fn test_private_method_is_inaccessible_from_top_level() {
    let mut b = AstBuilder::new();
    let mut vault = b.class("Vault");
    let one = b.int(1);
    let open_ret = b.ret(Some(one));
    let open = b.method("open", Visibility::Private, vec![], Some("int"), vec![open_ret]);
    vault.methods.push(open);
    let vault_stmt = b.class_stmt(vault);

    let made = b.new_object("Vault", vec![]);
    let call = b.method_call(made, "open", vec![]);
    let poke = b.expr_stmt(call);
    let program = b.program("registry.skink", vec![vault_stmt, poke]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InaccessibleMethod);
    assert!(analysis.issues[0].message.contains("private"));
}

#[test]
fn test_subclass_sees_protected_but_not_private() {
    let mut b = AstBuilder::new();
    let mut base = b.class("Base");
    let one = b.int(1);
    let secret_ret = b.ret(Some(one));
    let secret = b.method("secret", Visibility::Private, vec![], Some("int"), vec![secret_ret]);
    base.methods.push(secret);
    let two = b.int(2);
    let guarded_ret = b.ret(Some(two));
    let guarded = b.method(
        "guarded",
        Visibility::Protected,
        vec![],
        Some("int"),
        vec![guarded_ret],
    );
    base.methods.push(guarded);
    let base_stmt = b.class_stmt(base);

    let mut child = b.class("Child");
    child.parent = Some("Base".to_string());
    let this1 = b.var("$this");
    let secret_call = b.method_call(this1, "secret", vec![]);
    let try_secret = b.expr_stmt(secret_call);
    let this2 = b.var("$this");
    let guarded_call = b.method_call(this2, "guarded", vec![]);
    let try_guarded = b.expr_stmt(guarded_call);
    let poke = b.method(
        "poke",
        Visibility::Public,
        vec![],
        None,
        vec![try_secret, try_guarded],
    );
    child.methods.push(poke);
    let child_stmt = b.class_stmt(child);
    let program = b.program("registry.skink", vec![base_stmt, child_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    // Only the private call is rejected.
    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InaccessibleMethod);
    assert!(analysis.issues[0].message.contains("Base::secret"));
}

#[test]
fn test_protected_is_visible_between_sibling_subclasses() {
    let mut b = AstBuilder::new();
    let mut base = b.class("Stock");
    let one = b.int(1);
    let guarded_ret = b.ret(Some(one));
    let guarded = b.method(
        "guarded",
        Visibility::Protected,
        vec![],
        Some("int"),
        vec![guarded_ret],
    );
    base.methods.push(guarded);
    let base_stmt = b.class_stmt(base);

    let mut peer = b.class("Peer");
    peer.parent = Some("Stock".to_string());
    let peer_stmt = b.class_stmt(peer);

    let mut kin = b.class("Kin");
    kin.parent = Some("Stock".to_string());
    let other_param = b.param("$other", Some("Peer"));
    let other = b.var("$other");
    let call = b.method_call(other, "guarded", vec![]);
    let reach = b.expr_stmt(call);
    let touch = b.method("touch", Visibility::Public, vec![other_param], None, vec![reach]);
    kin.methods.push(touch);
    let kin_stmt = b.class_stmt(kin);
    let program = b.program("registry.skink", vec![base_stmt, peer_stmt, kin_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
}

#[test]
fn test_missing_method_reports_once() {
    let mut b = AstBuilder::new();
    let mut widget = b.class("Widget");
    let one = b.int(1);
    let render_ret = b.ret(Some(one));
    let render = b.method("render", Visibility::Public, vec![], Some("int"), vec![render_ret]);
    widget.methods.push(render);
    let widget_stmt = b.class_stmt(widget);

    let w_param = b.param("$w", Some("Widget"));
    let w_read = b.var("$w");
    let call = b.method_call(w_read, "paint", vec![]);
    let leave = b.ret(Some(call));
    let decl = b.function("draw", vec![w_param], Some("int"), vec![leave]);
    let func = b.function_stmt(decl);
    let program = b.program("registry.skink", vec![widget_stmt, func]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::UndefinedMethod);
    assert_eq!(
        analysis.issues[0].message,
        "Method Widget::paint does not exist"
    );
}

#[test]
fn test_wrong_casing_resolves_with_a_warning() {
    let mut b = AstBuilder::new();
    let logger = b.class("Logger");
    let logger_stmt = b.class_stmt(logger);
    let made = b.new_object("logger", vec![]);
    let made_id = made.id;
    let keep = b.assign_stmt("$l", made);
    let program = b.program("registry.skink", vec![logger_stmt, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidClassCasing);
    assert_eq!(
        analysis.issues[0].message,
        "Class logger should be referenced as Logger"
    );
    // The instance still resolves to the canonical class.
    let made_ty = analysis.node_types.get(&made_id).map(|ty| ty.to_string());
    assert_eq!(made_ty.as_deref(), Some("Logger"));
}

#[test]
fn test_circular_inheritance_reports_once() {
    let mut b = AstBuilder::new();
    let mut alpha = b.class("Alpha");
    alpha.parent = Some("Beta".to_string());
    let alpha_stmt = b.class_stmt(alpha);
    let mut beta = b.class("Beta");
    beta.parent = Some("Alpha".to_string());
    let beta_stmt = b.class_stmt(beta);
    let program = b.program("registry.skink", vec![alpha_stmt, beta_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::CircularHierarchy);
    assert!(analysis.issues[0].message.contains("Circular inheritance"));
}

#[test]
fn test_redeclared_class_reports_once() {
    let mut b = AstBuilder::new();
    let first = b.class("Dup");
    let first_stmt = b.class_stmt(first);
    let second = b.class("Dup");
    let second_stmt = b.class_stmt(second);
    let program = b.program("registry.skink", vec![first_stmt, second_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::DuplicateClass);
    assert_eq!(analysis.issues[0].message, "Cannot redeclare class Dup");
}

#[test]
fn test_interface_cannot_be_instantiated() {
    let mut b = AstBuilder::new();
    let shape = b.interface("Shape");
    let shape_stmt = b.class_stmt(shape);
    let made = b.new_object("Shape", vec![]);
    let made_id = made.id;
    let keep = b.assign_stmt("$s", made);
    let program = b.program("registry.skink", vec![shape_stmt, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidScope);
    assert_eq!(
        analysis.issues[0].message,
        "Cannot instantiate interface Shape"
    );
    let made_ty = analysis.node_types.get(&made_id).map(|ty| ty.to_string());
    assert_eq!(made_ty.as_deref(), Some("Shape"));
}

#[test]
fn test_class_constants_and_magic_class() {
    let mut b = AstBuilder::new();
    let mut palette = b.class("Palette");
    let eight = b.int(8);
    let depth = b.constant("DEPTH", eight);
    palette.constants.push(depth);
    let palette_stmt = b.class_stmt(palette);

    let depth_read = b.class_const("Palette", "DEPTH");
    let depth_read_id = depth_read.id;
    let keep_depth = b.assign_stmt("$d", depth_read);
    let name_read = b.class_const("Palette", "class");
    let name_read_id = name_read.id;
    let keep_name = b.assign_stmt("$n", name_read);
    let missing_read = b.class_const("Palette", "MISSING");
    let keep_missing = b.assign_stmt("$m", missing_read);
    let program = b.program(
        "registry.skink",
        vec![palette_stmt, keep_depth, keep_name, keep_missing],
    );

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::UndefinedConstant);
    assert_eq!(
        analysis.issues[0].message,
        "Constant Palette::MISSING is not defined"
    );
    let depth_ty = analysis.node_types.get(&depth_read_id).map(|ty| ty.to_string());
    assert_eq!(depth_ty.as_deref(), Some("int"));
    let name_ty = analysis.node_types.get(&name_read_id).map(|ty| ty.to_string());
    assert_eq!(name_ty.as_deref(), Some("string"));
}

#[test]
fn test_instance_property_rejects_static_access() {
    let mut b = AstBuilder::new();
    let mut counter = b.class("Counter");
    let count = b.property("count", Visibility::Public, true, Some("int"));
    counter.properties.push(count);
    let label = b.property("label", Visibility::Public, false, Some("string"));
    counter.properties.push(label);
    let counter_stmt = b.class_stmt(counter);

    let count_read = b.static_prop("Counter", "$count");
    let count_read_id = count_read.id;
    let keep_count = b.assign_stmt("$c", count_read);
    let label_read = b.static_prop("Counter", "$label");
    let keep_label = b.assign_stmt("$l", label_read);
    let program = b.program("registry.skink", vec![counter_stmt, keep_count, keep_label]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidStaticInvocation);
    assert_eq!(
        analysis.issues[0].message,
        "Property Counter::$label is not static"
    );
    let count_ty = analysis.node_types.get(&count_read_id).map(|ty| ty.to_string());
    assert_eq!(count_ty.as_deref(), Some("int"));
}

#[test]
fn test_instance_method_rejects_static_call() {
    let mut b = AstBuilder::new();
    let mut maker = b.class("Maker");
    let one = b.int(1);
    let make_ret = b.ret(Some(one));
    let mut make = b.method("make", Visibility::Public, vec![], Some("int"), vec![make_ret]);
    make.is_static = true;
    maker.methods.push(make);
    let two = b.int(2);
    let helper_ret = b.ret(Some(two));
    let helper = b.method("helper", Visibility::Public, vec![], Some("int"), vec![helper_ret]);
    maker.methods.push(helper);
    let maker_stmt = b.class_stmt(maker);

    let make_call = b.static_call("Maker", "make", vec![]);
    let make_call_id = make_call.id;
    let keep_make = b.assign_stmt("$a", make_call);
    let helper_call = b.static_call("Maker", "helper", vec![]);
    let keep_helper = b.assign_stmt("$b", helper_call);
    let program = b.program("registry.skink", vec![maker_stmt, keep_make, keep_helper]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidStaticInvocation);
    assert_eq!(
        analysis.issues[0].message,
        "Method Maker::helper is not static"
    );
    let make_ty = analysis.node_types.get(&make_call_id).map(|ty| ty.to_string());
    assert_eq!(make_ty.as_deref(), Some("int"));
}

#[test]
fn test_private_property_read_is_reported_but_typed() {
    let mut b = AstBuilder::new();
    let mut case = b.class("Box");
    let secret = b.property("secret", Visibility::Private, false, Some("int"));
    case.properties.push(secret);
    let case_stmt = b.class_stmt(case);

    let made = b.new_object("Box", vec![]);
    let fetch = b.prop_fetch(made, "secret");
    let fetch_id = fetch.id;
    let keep = b.assign_stmt("$v", fetch);
    let program = b.program("registry.skink", vec![case_stmt, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InaccessibleProperty);
    assert!(analysis.issues[0].message.contains("private"));
    let fetch_ty = analysis.node_types.get(&fetch_id).map(|ty| ty.to_string());
    assert_eq!(fetch_ty.as_deref(), Some("int"));
}

#[test]
fn test_deprecated_method_call_is_informational() {
    let mut b = AstBuilder::new();
    let mut api = b.class("Api");
    let one = b.int(1);
    let ping_ret = b.ret(Some(one));
    let mut ping = b.method("ping", Visibility::Public, vec![], Some("int"), vec![ping_ret]);
    ping.doc = Some(DocBlock {
        deprecated: true,
        ..DocBlock::default()
    });
    api.methods.push(ping);
    let api_stmt = b.class_stmt(api);

    let made = b.new_object("Api", vec![]);
    let call = b.method_call(made, "ping", vec![]);
    let poke = b.expr_stmt(call);
    let program = b.program("registry.skink", vec![api_stmt, poke]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::DeprecatedMethod);
    assert_eq!(analysis.issues[0].severity, Severity::Info);
    assert!(!analysis.has_errors());
}

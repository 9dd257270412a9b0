//! Integration tests for issue gating: suppression, severity, and fatal stops

use skink_ast::{AstBuilder, DocBlock, Visibility};
use skink_checker::{analyze, Config, IssueKind, Registry, Severity};

#[test]
fn test_doc_param_type_overrides_declared() {
    let mut b = AstBuilder::new();
    let x1_param = b.param("$x", Some("int"));
    let x1_read = b.var("$x");
    let leave1 = b.ret(Some(x1_read));
    let mut relabel = b.function("relabel", vec![x1_param], Some("string"), vec![leave1]);
    relabel.doc = Some(DocBlock {
        param_types: vec![("x".to_string(), "string".to_string())],
        ..DocBlock::default()
    });
    let relabel_stmt = b.function_stmt(relabel);

    let x2_param = b.param("$x", Some("int"));
    let x2_read = b.var("$x");
    let leave2 = b.ret(Some(x2_read));
    let plain = b.function("plain", vec![x2_param], Some("string"), vec![leave2]);
    let plain_stmt = b.function_stmt(plain);
    let program = b.program("issues.skink", vec![relabel_stmt, plain_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    // Only the function without the annotation mismatches.
    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidReturnType);
    assert!(analysis.issues[0].message.contains("plain"));
    assert!(analysis.issues[0].message.contains("declares return type string"));
}

#[test]
fn test_doc_suppress_silences_inside_the_function() {
    let mut b = AstBuilder::new();
    let ghost_read = b.var("$ghost");
    let spooky = b.echo(vec![ghost_read]);
    let mut quiet = b.function("quiet", vec![], None, vec![spooky]);
    quiet.doc = Some(DocBlock {
        suppressed: vec!["UndefinedVariable".to_string()],
        ..DocBlock::default()
    });
    let quiet_stmt = b.function_stmt(quiet);

    let phantom_read = b.var("$phantom");
    let loud_echo = b.echo(vec![phantom_read]);
    let loud = b.function("loud", vec![], None, vec![loud_echo]);
    let loud_stmt = b.function_stmt(loud);
    let program = b.program("issues.skink", vec![quiet_stmt, loud_stmt]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::UndefinedVariable);
    assert!(analysis.issues[0].message.contains("$phantom"));
}

#[test]
fn test_config_suppression_applies_to_the_whole_run() {
    let mut b = AstBuilder::new();
    let ghost_read = b.var("$ghost");
    let out = b.echo(vec![ghost_read]);
    let program = b.program("issues.skink", vec![out]);

    let mut config = Config::default();
    config.suppressed_kinds.insert(IssueKind::UndefinedVariable);
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
}

#[test]
fn test_severity_override_downgrades_to_info() {
    let mut b = AstBuilder::new();
    let ghost_read = b.var("$ghost");
    let out = b.echo(vec![ghost_read]);
    let program = b.program("issues.skink", vec![out]);

    let mut config = Config::default();
    config
        .severity_overrides
        .insert(IssueKind::UndefinedVariable, Severity::Info);
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].severity, Severity::Info);
    assert!(!analysis.has_errors());
}

#[test]
fn test_stop_on_first_error_halts_the_run() {
    let mut b = AstBuilder::new();
    let a_read = b.var("$a");
    let first = b.echo(vec![a_read]);
    let b_read = b.var("$b");
    let second = b.echo(vec![b_read]);
    let program = b.program("issues.skink", vec![first, second]);

    let config = Config {
        stop_on_first_error: true,
        ..Config::default()
    };
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    assert!(analysis.fatal.is_some(), "Expected a fatal stop");
    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].message, "Variable $a is not defined");
}

#[test]
fn test_stop_on_first_error_ignores_info_issues() {
    let mut b = AstBuilder::new();
    let mut old = b.function("old", vec![], None, vec![]);
    old.doc = Some(DocBlock {
        deprecated: true,
        ..DocBlock::default()
    });
    let old_stmt = b.function_stmt(old);
    let call = b.call("old", vec![]);
    let poke = b.expr_stmt(call);
    let ghost_read = b.var("$ghost");
    let out = b.echo(vec![ghost_read]);
    let program = b.program("issues.skink", vec![old_stmt, poke, out]);

    let config = Config {
        stop_on_first_error: true,
        ..Config::default()
    };
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    // The deprecation notice is recorded but only the error aborts.
    assert!(analysis.fatal.is_some(), "Expected a fatal stop");
    assert_eq!(analysis.issues.len(), 2, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::DeprecatedMethod);
    assert_eq!(analysis.issues[1].kind, IssueKind::UndefinedVariable);
}

#[test]
fn test_method_exists_forgives_until_end_of_block() {
    let mut b = AstBuilder::new();
    let ghosty = b.class("Ghosty");
    let ghosty_stmt = b.class_stmt(ghosty);
    let made = b.new_object("Ghosty", vec![]);
    let declare = b.assign_stmt("$g", made);

    let probe = b.int(1);
    let cond = b.call("is_int", vec![probe]);
    let g1 = b.var("$g");
    let x_name = b.str("x");
    let probe_call = b.call("method_exists", vec![g1, x_name]);
    let keep_seen = b.assign_stmt("$seen", probe_call);
    let g2 = b.var("$g");
    let phantom_call = b.method_call(g2, "phantom", vec![]);
    let keep_a = b.assign_stmt("$a", phantom_call);
    let guard = b.if_stmt(cond, vec![keep_seen, keep_a], None);

    let g3 = b.var("$g");
    let spook_call = b.method_call(g3, "spook", vec![]);
    let keep_b = b.assign_stmt("$b", spook_call);
    let program = b.program("issues.skink", vec![ghosty_stmt, declare, guard, keep_b]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    // The probe covers the rest of its block; the outer call is not
    // forgiven.
    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::UndefinedMethod);
    assert!(analysis.issues[0].message.contains("spook"));
}

#[test]
fn test_forbidden_shell_exec_call() {
    let mut b = AstBuilder::new();
    let cmd = b.str("ls");
    let call = b.call("shell_exec", vec![cmd]);
    let call_id = call.id;
    let keep = b.assign_stmt("$out", call);
    let program = b.program("issues.skink", vec![keep]);

    let config = Config {
        forbid_shell_exec: true,
        ..Config::default()
    };
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::ForbiddenCode);
    assert_eq!(
        analysis.issues[0].message,
        "Call to shell_exec is forbidden by configuration"
    );
    // The call is still typed so analysis can continue.
    let out_ty = analysis.node_types.get(&call_id).map(|ty| ty.to_string());
    assert_eq!(out_ty.as_deref(), Some("null|string"));
}

#[test]
fn test_forbidden_backtick_execution() {
    let mut b = AstBuilder::new();
    let cmd = b.str("ls");
    let sh = b.shell(cmd);
    let keep = b.assign_stmt("$out", sh);
    let program = b.program("issues.skink", vec![keep]);

    let config = Config {
        forbid_shell_exec: true,
        ..Config::default()
    };
    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &config);

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::ForbiddenCode);
    assert_eq!(
        analysis.issues[0].message,
        "Shell execution is forbidden by configuration"
    );
}

#[test]
fn test_shell_exec_is_allowed_by_default() {
    let mut b = AstBuilder::new();
    let cmd = b.str("ls");
    let call = b.call("shell_exec", vec![cmd]);
    let keep = b.assign_stmt("$out", call);
    let program = b.program("issues.skink", vec![keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
}

#[test]
fn test_nullability_strictness_changes_severity() {
    let mut b = AstBuilder::new();
    let mut holder = b.class("Holder");
    let one = b.int(1);
    let grab_ret = b.ret(Some(one));
    let grab = b.method("grab", Visibility::Public, vec![], Some("int"), vec![grab_ret]);
    holder.methods.push(grab);
    let holder_stmt = b.class_stmt(holder);

    let seed = b.null();
    let declare = b.assign_stmt_doc(
        "$h",
        seed,
        DocBlock {
            var_type: Some("Holder|null".to_string()),
            ..DocBlock::default()
        },
    );
    let h_read = b.var("$h");
    let call = b.method_call(h_read, "grab", vec![]);
    let call_id = call.id;
    let keep = b.assign_stmt("$v", call);
    let program = b.program("issues.skink", vec![holder_stmt, declare, keep]);

    let mut lenient_registry = Registry::new();
    let lenient = analyze(&program, &mut lenient_registry, &Config::default());
    assert_eq!(lenient.issues.len(), 1, "got: {:?}", lenient.issues);
    assert_eq!(lenient.issues[0].kind, IssueKind::PossiblyNullReference);
    assert_eq!(lenient.issues[0].severity, Severity::Info);
    assert!(!lenient.has_errors());
    let grabbed = lenient.node_types.get(&call_id).map(|ty| ty.to_string());
    assert_eq!(grabbed.as_deref(), Some("int"));

    let strict_config = Config {
        strict_nullability: true,
        ..Config::default()
    };
    let mut strict_registry = Registry::new();
    let strict = analyze(&program, &mut strict_registry, &strict_config);
    assert_eq!(strict.issues.len(), 1, "got: {:?}", strict.issues);
    assert_eq!(strict.issues[0].severity, Severity::Error);
    assert!(strict.has_errors());
}

//! Integration tests for closures, captures, and array callbacks

use skink_ast::{AstBuilder, DocBlock, ExprKind};
use skink_checker::{analyze, Config, IssueKind, Registry};

#[test]
fn test_capture_by_value_carries_outer_type() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let declare = b.assign_stmt("$n", one);

    let n_read = b.var("$n");
    let n_read_id = n_read.id;
    let leave = b.ret(Some(n_read));
    let capture = AstBuilder::use_by_value("$n");
    let cl = b.closure(vec![], vec![capture], vec![leave]);
    let cl_id = cl.id;
    let keep = b.assign_stmt("$f", cl);
    let program = b.program("closures.skink", vec![declare, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
    let inner = analysis.node_types.get(&n_read_id).map(|ty| ty.to_string());
    assert_eq!(inner.as_deref(), Some("int"));
    let cl_ty = analysis.node_types.get(&cl_id).map(|ty| ty.to_string());
    assert_eq!(cl_ty.as_deref(), Some("Closure"));
}

#[test]
fn test_capture_of_missing_variable_reports() {
    let mut b = AstBuilder::new();
    let ghost_read = b.var("$ghost");
    let leave = b.ret(Some(ghost_read));
    let capture = AstBuilder::use_by_value("$ghost");
    let cl = b.closure(vec![], vec![capture], vec![leave]);
    let keep = b.assign_stmt("$f", cl);
    let program = b.program("closures.skink", vec![keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::UndefinedVariable);
    assert_eq!(
        analysis.issues[0].message,
        "Variable $ghost is not defined in the enclosing scope"
    );
}

#[test]
fn test_capture_by_ref_defines_in_both_scopes() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let fill = b.assign_stmt("$out", one);
    let capture = AstBuilder::use_by_ref("$out");
    let cl = b.closure(vec![], vec![capture], vec![fill]);
    let keep = b.assign_stmt("$f", cl);

    let out_read = b.var("$out");
    let after = b.echo(vec![out_read]);
    let program = b.program("closures.skink", vec![keep, after]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    // A by-ref capture of a fresh name introduces it in the outer scope.
    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
}

#[test]
fn test_array_map_result_takes_callback_return() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let two = b.int(2);
    let nums = b.array(vec![(None, one), (None, two)]);
    let declare = b.assign_stmt("$nums", nums);

    let v_param = b.param("$v", None);
    let text = b.str("s");
    let leave = b.ret(Some(text));
    let cl = b.closure(vec![v_param], vec![], vec![leave]);
    let nums_read = b.var("$nums");
    let call = b.call("array_map", vec![cl, nums_read]);
    let call_id = call.id;
    let keep = b.assign_stmt("$r", call);
    let program = b.program("closures.skink", vec![declare, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
    let mapped = analysis.node_types.get(&call_id).map(|ty| ty.to_string());
    assert_eq!(mapped.as_deref(), Some("array<int, string>"));
}

#[test]
fn test_array_filter_without_callback_strips_null() {
    let mut b = AstBuilder::new();
    let empty = b.array(vec![]);
    let declare = b.assign_stmt_doc(
        "$vals",
        empty,
        DocBlock {
            var_type: Some("array<int, int|null>".to_string()),
            ..DocBlock::default()
        },
    );

    let vals_read = b.var("$vals");
    let call = b.call("array_filter", vec![vals_read]);
    let call_id = call.id;
    let keep = b.assign_stmt("$kept", call);
    let program = b.program("closures.skink", vec![declare, keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
    let kept = analysis.node_types.get(&call_id).map(|ty| ty.to_string());
    assert_eq!(kept.as_deref(), Some("array<int, int>"));
}

#[test]
fn test_array_keys_and_values_on_shaped_array() {
    let mut b = AstBuilder::new();
    let key = b.str("a");
    let val = b.int(1);
    let shape = b.array(vec![(Some(key), val)]);
    let declare = b.assign_stmt("$shape", shape);

    let read1 = b.var("$shape");
    let keys_call = b.call("array_keys", vec![read1]);
    let keys_call_id = keys_call.id;
    let keep_keys = b.assign_stmt("$ks", keys_call);
    let read2 = b.var("$shape");
    let values_call = b.call("array_values", vec![read2]);
    let values_call_id = values_call.id;
    let keep_values = b.assign_stmt("$vs", values_call);
    let program = b.program("closures.skink", vec![declare, keep_keys, keep_values]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
    let keys_ty = analysis.node_types.get(&keys_call_id).map(|ty| ty.to_string());
    assert_eq!(keys_ty.as_deref(), Some("array<int, string>"));
    let values_ty = analysis.node_types.get(&values_call_id).map(|ty| ty.to_string());
    assert_eq!(values_ty.as_deref(), Some("array<int, int>"));
}

#[test]
fn test_array_push_defines_its_by_ref_target() {
    let mut b = AstBuilder::new();
    let stack_arg = b.var("$stack");
    let one = b.int(1);
    let push_call = b.call("array_push", vec![stack_arg, one]);
    let push = b.expr_stmt(push_call);

    let stack_read = b.var("$stack");
    let stack_read_id = stack_read.id;
    let after = b.echo(vec![stack_read]);
    let program = b.program("closures.skink", vec![push, after]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert!(
        analysis.issues.is_empty(),
        "Expected no issues, got: {:?}",
        analysis.issues
    );
    let stack_ty = analysis.node_types.get(&stack_read_id).map(|ty| ty.to_string());
    assert_eq!(stack_ty.as_deref(), Some("array<mixed, mixed>"));
}

#[test]
fn test_closure_return_type_is_enforced() {
    let mut b = AstBuilder::new();
    let text = b.str("s");
    let leave = b.ret(Some(text));
    let cl = b.expr(ExprKind::Closure {
        params: vec![],
        uses: vec![],
        return_type: Some("int".to_string()),
        body: vec![leave],
    });
    let keep = b.assign_stmt("$f", cl);
    let program = b.program("closures.skink", vec![keep]);

    let mut registry = Registry::new();
    let analysis = analyze(&program, &mut registry, &Config::default());

    assert_eq!(analysis.issues.len(), 1, "got: {:?}", analysis.issues);
    assert_eq!(analysis.issues[0].kind, IssueKind::InvalidReturnType);
    assert!(analysis.issues[0].message.contains("closure"));
}

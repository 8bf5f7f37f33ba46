// tests/infer_scenarios.rs
//! End-to-end inference scenarios: each builds a small program through the
//! DSL, infers it, checks the resulting types, and replays inference to
//! verify the fixpoint is stable.

mod common;

use common::{assert_replay_identical, infer, ty};

#[test]
fn or_of_int_and_char_is_union() {
    // a = 1 || 'c'
    let mut a_id = None;
    let (mut analyzer, root) = infer(|b| {
        let one = b.int(1);
        let c = b.char_('c');
        let or = b.or_(one, c);
        let a = b.var("a");
        a_id = Some(a);
        let assign = b.assign(a, or);
        b.exprs(vec![assign])
    });

    let a = a_id.unwrap();
    let a_ty = analyzer.type_of(a).expect("a must be typed");
    let members = analyzer
        .types
        .as_union(a_ty)
        .expect("a must be a union")
        .to_vec();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&analyzer.types.primitives.i32));
    assert!(members.contains(&analyzer.types.primitives.char));

    assert_replay_identical(&mut analyzer, root);
}

#[test]
fn hierarchy_dispatch_unions_results_and_records_targets() {
    // class Foo; def foo; 1; end; end
    // class Bar < Foo; def foo; 1.5; end; end
    // (Foo.new || Bar.new).foo
    let mut call_id = None;
    let (mut analyzer, root) = infer(|b| {
        let one = b.int(1);
        let foo_def = b.def_("foo", vec![], one);
        let foo_class = b.class_("Foo", vec![foo_def]);

        let one_five = b.float(1.5);
        let bar_def = b.def_("foo", vec![], one_five);
        let bar_class = b.class_sup("Bar", "Foo", vec![bar_def]);

        let foo_const = b.const_(&["Foo"]);
        let foo_new = b.call(Some(foo_const), "new", vec![]);
        let bar_const = b.const_(&["Bar"]);
        let bar_new = b.call(Some(bar_const), "new", vec![]);
        let or = b.or_(foo_new, bar_new);
        let call = b.call(Some(or), "foo", vec![]);
        call_id = Some(call);
        b.exprs(vec![foo_class, bar_class, call])
    });

    let call = call_id.unwrap();
    let call_ty = analyzer.type_of(call).expect("call must be typed");
    let members = analyzer
        .types
        .as_union(call_ty)
        .expect("virtual call must union its sub-results")
        .to_vec();
    assert!(members.contains(&analyzer.types.primitives.i32));
    assert!(members.contains(&analyzer.types.primitives.f64));
    assert_eq!(analyzer.target_defs(call).len(), 2);

    assert_replay_identical(&mut analyzer, root);
}

#[test]
fn open_class_family_collapses_to_hierarchy() {
    // class Foo; end / class Bar < Foo; end / class Baz < Foo; end
    // a = Foo.new || Bar.new || Baz.new
    let mut a_id = None;
    let (mut analyzer, root) = infer(|b| {
        let foo_class = b.class_("Foo", vec![]);
        let bar_class = b.class_sup("Bar", "Foo", vec![]);
        let baz_class = b.class_sup("Baz", "Foo", vec![]);

        let foo_const = b.const_(&["Foo"]);
        let foo_new = b.call(Some(foo_const), "new", vec![]);
        let bar_const = b.const_(&["Bar"]);
        let bar_new = b.call(Some(bar_const), "new", vec![]);
        let baz_const = b.const_(&["Baz"]);
        let baz_new = b.call(Some(baz_const), "new", vec![]);
        let inner = b.or_(foo_new, bar_new);
        let outer = b.or_(inner, baz_new);
        let a = b.var("a");
        a_id = Some(a);
        let assign = b.assign(a, outer);
        b.exprs(vec![foo_class, bar_class, baz_class, assign])
    });

    let a = a_id.unwrap();
    assert_eq!(ty(&analyzer, a), "Foo+");

    assert_replay_identical(&mut analyzer, root);
}

#[test]
fn instance_var_hoists_to_writing_superclass() {
    // class Base; end
    // class Var < Base; def x=(x); @x = x; end; end
    // class Base; def x=(x); @x = x; end; end
    // v = Var.new; v.x = 1
    let (mut analyzer, root) = infer(|b| {
        let base_class = b.class_("Base", vec![]);

        let x_read = b.var("x");
        let ivar = b.ivar("@x");
        let body = b.assign(ivar, x_read);
        let x_param = b.param("x");
        let var_setter = b.def_("x=", vec![x_param], body);
        let var_class = b.class_sup("Var", "Base", vec![var_setter]);

        let x_read2 = b.var("x");
        let ivar2 = b.ivar("@x");
        let body2 = b.assign(ivar2, x_read2);
        let x_param2 = b.param("x");
        let base_setter = b.def_("x=", vec![x_param2], body2);
        let base_reopen = b.class_("Base", vec![base_setter]);

        let var_const = b.const_(&["Var"]);
        let var_new = b.call(Some(var_const), "new", vec![]);
        let v = b.var("v");
        let v_assign = b.assign(v, var_new);
        let v_read = b.var("v");
        let one = b.int(1);
        let set_call = b.call(Some(v_read), "x=", vec![one]);
        b.exprs(vec![base_class, var_class, base_reopen, v_assign, set_call])
    });

    let base = analyzer.class_by_name("Base").expect("Base registered");
    let var = analyzer.class_by_name("Var").expect("Var registered");

    assert_eq!(
        analyzer.instance_var_count(var),
        0,
        "the subclass must not own a hoisted cell"
    );
    let x_ty = analyzer
        .instance_var_type(base, "@x")
        .expect("Base owns @x");
    let members = analyzer
        .types
        .as_union(x_ty)
        .expect("@x must be nilable")
        .to_vec();
    assert_eq!(members.len(), 2);
    assert!(members.contains(&analyzer.types.primitives.nil));
    assert!(members.contains(&analyzer.types.primitives.i32));

    assert_replay_identical(&mut analyzer, root);
}

#[test]
fn rescue_merges_body_and_handler_arms() {
    // y = 1
    // begin; y == 1 ? raise "e" : nil; 2; rescue; 3; end
    let mut handler_id = None;
    let (mut analyzer, root) = infer(|b| {
        let y = b.var("y");
        let one = b.int(1);
        let y_assign = b.assign(y, one);

        let y_read = b.var("y");
        let one_again = b.int(1);
        let cond = b.call(Some(y_read), "==", vec![one_again]);
        let msg = b.str_("e");
        let raised = b.raise_(msg);
        let nil = b.nil();
        let ternary = b.if_(cond, raised, Some(nil));
        let two = b.int(2);
        let body = b.exprs(vec![ternary, two]);

        let three = b.int(3);
        let rescue = b.rescue_(vec![], None, three);
        let handler = b.begin_(body, vec![rescue], None, None);
        handler_id = Some(handler);
        b.exprs(vec![y_assign, handler])
    });

    // Both arms yield Int32; the single-member union collapses
    let handler = handler_id.unwrap();
    assert_eq!(ty(&analyzer, handler), "Int32");

    assert_replay_identical(&mut analyzer, root);
}

#[test]
fn hash_literal_types_to_generic_instance() {
    // {1 => 1.5} of Int32 => Float64
    let mut hash_id = None;
    let (mut analyzer, root) = infer(|b| {
        let k = b.int(1);
        let v = b.float(1.5);
        let key_ref = b.tref("Int32");
        let value_ref = b.tref("Float64");
        let hash = b.hash_of(vec![(k, v)], key_ref, value_ref);
        hash_id = Some(hash);
        b.exprs(vec![hash])
    });

    let hash = hash_id.unwrap();
    assert_eq!(ty(&analyzer, hash), "Hash(Int32, Float64)");

    assert_replay_identical(&mut analyzer, root);
}

use call_site::{ApplicableMethodResolver, Arg, CollectionElement, Lambda, MethodGroup};
use miette::Diagnostic;
use shape::{DefTable, RefKind, Shape, Signature, StandardConversions, Variance};

use crate::*;

pub fn with_env<R>(
    table: &DefTable,
    include_nullability: bool,
    f: impl FnOnce(InferEnv<'_>) -> R,
) -> R {
    let conversions = StandardConversions::new(table);
    let methods = ApplicableMethodResolver::new(&conversions);
    f(InferEnv {
        types: table,
        conversions: &conversions,
        methods: &methods,
        include_nullability,
    })
}

pub fn infer(table: &DefTable, site: &CallSite) -> TypeInferenceResult {
    with_env(table, true, |env| {
        infer_method(env, site).expect("call site is well formed")
    })
}

pub fn construct(table: &DefTable, site: &CallSite) -> TypeInferenceResult {
    with_env(table, true, |env| {
        infer_constructor(env, site).expect("call site is well formed")
    })
}

fn violation(table: &DefTable, site: &CallSite) -> ContractViolation {
    with_env(table, true, |env| {
        infer_method(env, site).expect_err("call site should be rejected")
    })
}

#[track_caller]
fn expect_inferred(result: &TypeInferenceResult, type_args: &[Shape], inferred_vars: &[Shape]) {
    assert!(result.success, "inference failed: {:?}", result.failures);
    let wrap = |shapes: &[Shape]| shapes.iter().cloned().map(Some).collect::<Vec<_>>();
    assert_eq!(result.type_args, wrap(type_args));
    assert_eq!(result.inferred_vars, wrap(inferred_vars));
}

#[track_caller]
fn expect_failure(result: &TypeInferenceResult, expected: InferenceFailure) {
    assert!(!result.success);
    assert!(
        result.failures.contains(&expected),
        "expected {expected:?} among {:?}",
        result.failures
    );
}

fn returns(shape: Shape) -> impl Fn(&[Shape]) -> Option<Shape> + Send + Sync + 'static {
    move |_| Some(shape.clone())
}

// ==========================================================================
// Explicit type-argument patterns
// ==========================================================================

#[test]
fn placeholder_next_to_concrete_type_argument() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let p = table.placeholder();

    // F<_, string>(1)
    let site = CallSite::new([t1, t2])
        .param(Shape::var(t1))
        .arg(table.int())
        .type_args([Shape::var(p), table.string()], [p]);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string()], &[table.int()]);
    assert!(!result.from_function_type);
}

#[test]
fn independent_placeholders() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let p1 = table.placeholder();
    let p2 = table.placeholder();

    // F<_, _>(1, "")
    let site = CallSite::new([t1, t2])
        .param(Shape::var(t1))
        .param(Shape::var(t2))
        .arg(table.int())
        .arg(table.string())
        .type_args([Shape::var(p1), Shape::var(p2)], [p1, p2]);

    let result = infer(&table, &site);
    expect_inferred(
        &result,
        &[table.int(), table.string()],
        &[table.int(), table.string()],
    );
}

#[test]
fn placeholder_inside_a_generic_type() {
    let mut table = DefTable::new();
    let (list, _) = table.class("List", &["T"]);
    let t = table.type_param("T");
    let p = table.placeholder();

    // F<List<_>>(new List<int>())
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.named(list, [table.int()]))
        .type_args([table.named(list, [Shape::var(p)])], [p]);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.named(list, [table.int()])], &[table.int()]);
}

#[test]
fn unconstrained_placeholder_fails() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let p1 = table.placeholder();
    let p2 = table.placeholder();

    // F<_, _>("") where only the first parameter is used
    let site = CallSite::new([t1, t2])
        .param(Shape::var(t1))
        .arg(table.string())
        .type_args([Shape::var(p1), Shape::var(p2)], [p1, p2]);

    let result = infer(&table, &site);
    expect_failure(
        &result,
        InferenceFailure::CyclicUnresolvable {
            unfixed: vec![t2, p2],
        },
    );
    assert_eq!(result.type_args, vec![Some(table.string()), None]);
    assert_eq!(result.inferred_vars, vec![Some(table.string()), None]);
}

#[test]
fn placeholder_through_an_implemented_interface() {
    let mut table = DefTable::new();
    let (i2, _) = table.interface("I2", &[("X", Variance::Invariant), ("Y", Variance::Out)]);
    let (c2, c2_params) = table.class("C2", &["X", "Y"]);
    let c2_as_i2 = table.named(i2, c2_params.iter().copied().map(Shape::var));
    table.add_interface(c2, c2_as_i2);
    let (a, _) = table.class("A", &[]);
    let (b, _) = table.class("B", &[]);
    let a = table.named(a, []);
    table.set_base(b, a.clone());
    let b = table.named(b, []);

    let t = table.type_param("T");
    let p = table.placeholder();

    // F<I2<_, A>>(new C2<int, B>())
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.named(c2, [table.int(), b]))
        .type_args([table.named(i2, [Shape::var(p), a.clone()])], [p]);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.named(i2, [table.int(), a])], &[table.int()]);
}

#[test]
fn annotated_placeholder_keeps_annotation_for_reference_types() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let p = table.placeholder();

    // F<_?>("")
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.string())
        .type_args([Shape::var(p).annotated()], [p]);
    let result = infer(&table, &site);
    expect_inferred(&result, &[table.string().annotated()], &[table.string()]);

    // F<_?>(1)
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.int())
        .type_args([Shape::var(p).annotated()], [p]);
    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int()], &[table.int()]);
}

#[test]
fn shape_wins_over_argument_bounds() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<object>("")
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.string())
        .type_args([table.object()], []);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.object()], &[]);
}

#[test]
fn shape_conflicting_with_an_argument_leaves_no_candidate() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<int>("")
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.string())
        .type_args([table.int()], []);

    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::NoCandidate { var: t });
    assert_eq!(result.type_args, vec![None]);
}

// ==========================================================================
// Constraints and target types
// ==========================================================================

#[test]
fn constraint_feeds_placeholder_through_another_parameter() {
    let mut table = DefTable::new();
    let (c1, _) = table.class("C1", &["T"]);
    let (_, c4_params) = table.class("C4", &["T1", "T2"]);
    let (t1, t2) = (c4_params[0], c4_params[1]);
    let p1 = table.placeholder();
    let p2 = table.placeholder();

    // class C4<T1, T2> where T1 : C1<T2> { C4(T2 x) }
    // new C4<_, _>(1)
    let site = CallSite::new([t1, t2])
        .param(Shape::var(t2))
        .arg(table.int())
        .type_args([Shape::var(p1), Shape::var(p2)], [p1, p2])
        .constraints(vec![vec![table.named(c1, [Shape::var(t2)])], vec![]]);

    let c1_int = table.named(c1, [table.int()]);
    let result = construct(&table, &site);
    expect_inferred(
        &result,
        &[c1_int.clone(), table.int()],
        &[c1_int, table.int()],
    );
}

#[test]
fn target_type_constrains_constructed_type() {
    let mut table = DefTable::new();
    let (c1, _) = table.class("C1", &["T"]);
    let (c2, c2_params) = table.class("C2", &["T"]);
    let t = c2_params[0];
    let c2_base = table.named(c1, [Shape::var(t)]);
    table.set_base(c2, c2_base);
    let p = table.placeholder();

    // C1<int> x = new C2<_>();
    let site = CallSite::new([t])
        .type_args([Shape::var(p)], [p])
        .target(
            table.named(c1, [table.int()]),
            table.named(c2, [Shape::var(t)]),
            false,
        );

    let result = construct(&table, &site);
    expect_inferred(&result, &[table.int()], &[table.int()]);
}

#[test]
fn violated_constraint_leaves_no_candidate() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<T>(T x) where T : string, called with 1
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.int())
        .constraints(vec![vec![table.string()]]);

    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::NoCandidate { var: t });
}

// ==========================================================================
// Lambdas and method groups
// ==========================================================================

#[test]
fn output_types_flow_along_a_chain_of_lambdas() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let t3 = table.type_param("T3");
    let (v1, v2, v3) = (Shape::var(t1), Shape::var(t2), Shape::var(t3));

    // F(1, x => x.ToString(), s => s.Length)
    let string = table.string();
    let site = CallSite::new([t1, t2, t3])
        .param(v1.clone())
        .param(table.func([v1], v2.clone()))
        .param(table.func([v2], v3))
        .arg(table.int())
        .arg(Lambda::implicit(1, returns(string)))
        .arg(Lambda::implicit(1, returns(table.int())));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string(), table.int()], &[]);
}

#[test]
fn explicit_lambda_breaks_a_cycle() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let (v1, v2) = (Shape::var(t1), Shape::var(t2));

    // F((int x) => x.ToString(), s => s.Length)
    let site = CallSite::new([t1, t2])
        .param(table.func([v1.clone()], v2.clone()))
        .param(table.func([v2], v1))
        .arg(Lambda::explicit([table.int()], returns(table.string())))
        .arg(Lambda::implicit(1, returns(table.int())));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string()], &[]);
}

#[test]
fn implicit_lambdas_alone_make_no_progress() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");
    let (v1, v2) = (Shape::var(t1), Shape::var(t2));

    let site = CallSite::new([t1, t2])
        .param(table.func([v1.clone()], v2.clone()))
        .param(table.func([v2], v1))
        .arg(Lambda::implicit(1, returns(table.string())))
        .arg(Lambda::implicit(1, returns(table.int())));

    let result = infer(&table, &site);
    expect_failure(
        &result,
        InferenceFailure::CyclicUnresolvable {
            unfixed: vec![t1, t2],
        },
    );
    assert_eq!(result.type_args, vec![None, None]);
}

#[test]
fn lambda_body_sees_fixed_parameter_types() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");
    let (string, long) = (table.string(), table.long());

    // The body only types with a string parameter.
    let body = move |params: &[Shape]| (params.first() == Some(&string)).then(|| long.clone());
    let site = CallSite::new([t, u])
        .param(Shape::var(t))
        .param(table.func([Shape::var(t)], Shape::var(u)))
        .arg(table.string())
        .arg(Lambda::implicit(1, body));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.string(), table.long()], &[]);
}

#[test]
fn method_group_return_type_is_resolved_against_fixed_parameters() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    let group = MethodGroup::new(
        "Describe",
        [
            Signature::new([table.int()], table.string()),
            Signature::new([table.string()], table.bool()),
        ],
    );
    let site = CallSite::new([t, u])
        .param(Shape::var(t))
        .param(table.func([Shape::var(t)], Shape::var(u)))
        .arg(table.int())
        .arg(group);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string()], &[]);
}

#[test]
fn explicit_lambda_fixes_to_its_natural_delegate() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F((int x) => "")
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(Lambda::explicit([table.int()], returns(table.string())));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.func([table.int()], table.string())], &[]);
    assert!(result.from_function_type);
}

#[test]
fn expression_constraint_wraps_the_natural_delegate() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let lambda_expression = table.named(table.well_known().lambda_expression, []);
    table.add_constraint(t, lambda_expression);

    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(Lambda::explicit([table.int()], returns(table.string())));

    let result = infer(&table, &site);
    let delegate = table.func([table.int()], table.string());
    expect_inferred(&result, &[table.expression_of(delegate)], &[]);
    assert!(result.from_function_type);
}

#[test]
fn function_type_loses_to_an_ordinary_bound() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let delegate = table.func([table.int()], table.string());

    let site = CallSite::new([t])
        .param(Shape::var(t))
        .param(Shape::var(t))
        .arg(Lambda::explicit([table.int()], returns(table.string())))
        .arg(delegate.clone());

    let result = infer(&table, &site);
    expect_inferred(&result, &[delegate], &[]);
    assert!(!result.from_function_type);
}

#[test]
fn containing_type_arguments_are_already_known() {
    let mut table = DefTable::new();
    let outer = table.type_param("TOuter");
    let t = table.type_param("T");

    // class Outer<TOuter> { void F<T>(Func<TOuter, T> f) } on Outer<int>
    let mut site = CallSite::new([t])
        .param(table.func([Shape::var(outer)], Shape::var(t)))
        .arg(Lambda::implicit(1, |params| params.first().cloned()));
    site.containing.insert(outer, table.int());

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int()], &[]);
}

// ==========================================================================
// Pointers and function pointers
// ==========================================================================

#[test]
fn pointer_arguments_give_exact_bounds() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<T>(T* p) with an int*
    let site = CallSite::new([t])
        .param(Shape::pointer(Shape::var(t)))
        .arg(Shape::pointer(table.int()));
    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int()], &[]);

    // F<T>(T a, T b) with an int* and a long*: exact, so no common type
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .param(Shape::var(t))
        .arg(Shape::pointer(table.int()))
        .arg(Shape::pointer(table.long()));
    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::AmbiguousBounds { var: t });
}

#[test]
fn function_pointer_parameters_and_return() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    // F<T, U>(delegate*<T, U> f) with a delegate*<string, object>
    let site = CallSite::new([t, u])
        .param(Shape::fn_ptr(Signature::new([Shape::var(t)], Shape::var(u))))
        .arg(Shape::fn_ptr(Signature::new([table.string()], table.object())));
    let result = infer(&table, &site);
    expect_inferred(&result, &[table.string(), table.object()], &[]);
}

#[test]
fn function_pointer_parameter_is_an_upper_bound() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<T>(delegate*<T, int> f, T x) with a delegate*<string, int> and an
    // object: string is an upper bound, object a lower one, nothing fits both.
    let site = CallSite::new([t])
        .param(Shape::fn_ptr(Signature::new([Shape::var(t)], table.int())))
        .param(Shape::var(t))
        .arg(Shape::fn_ptr(Signature::new([table.string()], table.int())))
        .arg(table.object());
    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::NoCandidate { var: t });
}

#[test]
fn function_pointer_by_reference_is_matched_exactly() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F<T>(ref delegate*<T, int> f, ref T x) with a string and a long
    let site = CallSite::new([t])
        .ref_param(Shape::fn_ptr(Signature::new([Shape::var(t)], table.int())), RefKind::Ref)
        .ref_param(Shape::var(t), RefKind::Ref)
        .arg(Shape::fn_ptr(Signature::new([table.string()], table.int())))
        .arg(table.long());
    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::AmbiguousBounds { var: t });
}

#[test]
fn nested_function_pointer_parameter_flips_back_to_a_lower_bound() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let int = table.int();
    let fn_ptr_of = |param: Shape| Shape::fn_ptr(Signature::new([param], int.clone()));

    // F<T>(delegate*<delegate*<T, int>, int> f, T x) with a
    // delegate*<delegate*<string, int>, int> and an object: both lower bounds
    let site = CallSite::new([t])
        .param(fn_ptr_of(fn_ptr_of(Shape::var(t))))
        .param(Shape::var(t))
        .arg(fn_ptr_of(fn_ptr_of(table.string())))
        .arg(table.object());
    let result = infer(&table, &site);
    expect_inferred(&result, &[table.object()], &[]);
}

#[test]
fn address_of_method_group_against_a_function_pointer() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    // F<T, U>(T x, delegate*<T, U> f) called as F(1, &Describe)
    let group = MethodGroup::new(
        "Describe",
        [
            Signature::new([table.int()], table.string()),
            Signature::new([table.string()], table.bool()),
        ],
    )
    .address_of();
    let site = CallSite::new([t, u])
        .param(Shape::var(t))
        .param(Shape::fn_ptr(Signature::new([Shape::var(t)], Shape::var(u))))
        .arg(table.int())
        .arg(group);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string()], &[]);
}

// ==========================================================================
// Nullability
// ==========================================================================

#[test]
fn lower_bounds_differing_in_annotations_merge() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let site = CallSite::new([t])
        .param(Shape::var(t))
        .param(Shape::var(t))
        .arg(table.ienumerable(table.string()))
        .arg(table.ienumerable(table.string().annotated()));

    let result = infer(&table, &site);
    expect_inferred(
        &result,
        &[table.ienumerable(table.string().annotated())],
        &[],
    );
}

#[test]
fn null_argument_annotates_the_result() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let site = CallSite::new([t])
        .param(Shape::var(t))
        .param(Shape::var(t))
        .arg(table.string())
        .arg(Arg::Null);

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.string().annotated()], &[]);

    let result = with_env(&table, false, |env| infer_method(env, &site).expect("valid"));
    expect_inferred(&result, &[table.string().erase_nullability()], &[]);
}

// ==========================================================================
// Tuples and collections
// ==========================================================================

#[test]
fn tuple_literal_without_a_type_is_inferred_componentwise() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    // F((1, null), "")
    let site = CallSite::new([t, u])
        .param(Shape::tuple([Shape::var(t), Shape::var(u)]))
        .param(Shape::var(u))
        .arg(Arg::Tuple(vec![table.int().into(), Arg::Null]))
        .arg(table.string());

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string().annotated()], &[]);
}

#[test]
fn typed_tuple_gives_lower_bounds_per_element() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    let site = CallSite::new([t, u])
        .param(Shape::tuple([Shape::var(t), Shape::var(u)]))
        .arg(Shape::tuple([table.int(), table.string()]));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int(), table.string()], &[]);
}

#[test]
fn collection_elements_widen_to_a_common_type() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F([1, ..longs])
    let site = CallSite::new([t])
        .param(table.ienumerable(Shape::var(t)))
        .arg(Arg::Collection(vec![
            CollectionElement::Expr(table.int().into()),
            CollectionElement::Spread(Some(table.long())),
        ]));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.long()], &[]);
}

#[test]
fn array_argument_against_generic_collection_interface() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let site = CallSite::new([t])
        .param(table.ienumerable(Shape::var(t)))
        .arg(Shape::array(table.string()));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.string()], &[]);
}

// ==========================================================================
// Boundary behavior
// ==========================================================================

#[test]
fn exact_bounds_do_not_widen() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // F(ref int, ref long)
    let site = CallSite::new([t])
        .ref_param(Shape::var(t), RefKind::Ref)
        .ref_param(Shape::var(t), RefKind::Ref)
        .arg(table.int())
        .arg(table.long());

    let result = infer(&table, &site);
    expect_failure(&result, InferenceFailure::AmbiguousBounds { var: t });
    assert_eq!(result.type_args, vec![None]);
}

#[test]
fn lower_bounds_widen() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let site = CallSite::new([t])
        .param(Shape::var(t))
        .param(Shape::var(t))
        .arg(table.int())
        .arg(table.long());

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.long()], &[]);
}

#[test]
fn error_bounds_are_ignored_when_fixing() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let site = CallSite::new([t])
        .param(table.ienumerable(Shape::var(t)))
        .param(table.ienumerable(Shape::var(t)))
        .arg(table.ienumerable(table.int()))
        .arg(table.ienumerable(Shape::error()));

    let result = infer(&table, &site);
    expect_inferred(&result, &[table.int()], &[]);
}

#[test]
fn nothing_to_infer_from() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let result = infer(&table, &CallSite::new([t]));
    assert!(!result.success);
    assert_eq!(result.type_args, vec![None]);
}

#[test]
fn first_argument_pins_the_receiver() {
    let mut table = DefTable::new();
    let t1 = table.type_param("T1");
    let t2 = table.type_param("T2");

    // static void F<T1, T2>(this IEnumerable<T1> xs, T2 y) on an int[]
    let site = CallSite::new([t1, t2])
        .param(table.ienumerable(Shape::var(t1)))
        .param(Shape::var(t2))
        .arg(Shape::array(table.int()))
        .arg(table.string());

    let type_args = with_env(&table, true, |env| {
        infer_type_arguments_from_first_argument(env, &site).expect("valid")
    });
    assert_eq!(type_args, Some(vec![Some(table.int()), None]));
}

#[test]
fn first_argument_probe_needs_a_typed_receiver() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    let site = CallSite::new([t])
        .param(table.func([table.int()], Shape::var(t)))
        .arg(Lambda::implicit(1, returns(table.int())));

    let type_args = with_env(&table, true, |env| {
        infer_type_arguments_from_first_argument(env, &site).expect("valid")
    });
    assert_eq!(type_args, None);
}

#[test]
fn first_argument_probe_reports_inferred_placeholders() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let p = table.placeholder();
    let (list, _) = table.class("List", &["T"]);

    let site = CallSite::new([t])
        .param(Shape::var(t))
        .arg(table.named(list, [table.int()]))
        .type_args([table.named(list, [Shape::var(p)])], [p]);

    with_env(&table, true, |env| {
        let probe = can_infer_from_first_argument(env, &site)
            .expect("valid")
            .expect("first argument is enough");
        assert_eq!(probe.type_args(), vec![Some(table.named(list, [table.int()]))]);
        assert_eq!(probe.inferred_vars(), vec![Some(table.int())]);
    });
}

#[test]
fn first_argument_probe_needs_a_parameter_and_an_argument() {
    let mut table = DefTable::new();
    let t = table.type_param("T");

    // Only a type-argument hint: there is no receiver to look at.
    let hint_only = CallSite::new([t]).type_args([table.int()], []);
    let no_arg = CallSite::new([t])
        .param(Shape::var(t))
        .type_args([table.int()], []);

    with_env(&table, true, |env| {
        for site in [&hint_only, &no_arg] {
            let type_args = infer_type_arguments_from_first_argument(env, site).expect("valid");
            assert_eq!(type_args, None, "{site:?}");
        }
    });
}

#[test]
fn foreign_placeholder_is_rejected() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let stray = table.placeholder();

    let site = CallSite::new([t])
        .param(table.ienumerable(Shape::var(stray)))
        .arg(table.ienumerable(table.int()));

    let err = violation(&table, &site);
    assert_eq!(err, ContractViolation::ForeignPlaceholder { var: stray });
    assert_eq!(
        err.code().map(|c| c.to_string()).as_deref(),
        Some("infer::foreign_placeholder")
    );
}

#[test]
fn malformed_call_sites_are_rejected() {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");

    let duplicate = CallSite::new([t, t]);
    assert_eq!(
        violation(&table, &duplicate),
        ContractViolation::DuplicateVariable { var: t }
    );

    let short = CallSite::new([t, u]).type_args([table.int()], []);
    assert_eq!(
        violation(&table, &short),
        ContractViolation::TypeArgumentCount {
            expected: 2,
            found: 1
        }
    );

    let constraints = CallSite::new([t, u]).constraints(vec![vec![]]);
    assert_eq!(
        violation(&table, &constraints),
        ContractViolation::ConstraintCount {
            expected: 2,
            found: 1
        }
    );

    let targeted = CallSite::new([t]).target(table.int(), Shape::var(t), false);
    assert_eq!(
        violation(&table, &targeted),
        ContractViolation::TargetOnMethodCall
    );
}

// ==========================================================================
// Property-Based Tests for Inference Sessions
// ==========================================================================
//
// Generates calls `F<T, U>(p1, p2, ..)(a1, a2, ..)` where the formal
// parameter types are random shapes over `T` and `U` and the arguments are
// random closed shapes, then checks that sessions are deterministic and that
// every fixed variable satisfies the bounds it was fixed from.
//
// Known limitations:
// - Most generated calls fail to infer anything: random formal and actual
//   shapes rarely line up. The properties still hold for the variables that
//   do get fixed, which is what they check.
// - No lambdas, method groups or explicit type-argument patterns are
//   generated; those paths are covered by the scenario tests.

use proptest::prelude::{prop, prop_assert, prop_assert_eq, proptest, Strategy, TestCaseError};
use shape::{
    arbitrary::{arb_shape, RecursiveParams, Universe},
    DefTable, Shape, TyVar,
};

use crate::{tests::with_env, CallSite, Inferrer, Mode};

struct Fixture {
    table: DefTable,
    t: TyVar,
    u: TyVar,
}

/// Every call builds the same definitions in the same order, so ids drawn by
/// one fixture's strategies are valid in another's table.
fn fixture() -> Fixture {
    let mut table = DefTable::new();
    let t = table.type_param("T");
    let u = table.type_param("U");
    Fixture { table, t, u }
}

fn arb_call() -> impl Strategy<Value = (Vec<Shape>, Vec<Shape>)> {
    let f = fixture();
    let params = RecursiveParams {
        depth: 2,
        desired_size: 8,
        expected_branch_size: 2,
    };
    let formal = arb_shape(Universe::from_table(&f.table, &[f.t, f.u]), params);
    let actual = arb_shape(Universe::from_table(&f.table, &[]), params);
    (
        prop::collection::vec(formal, 1..4),
        prop::collection::vec(actual, 1..4),
    )
}

fn call_site(f: &Fixture, formals: &[Shape], actuals: &[Shape]) -> CallSite {
    let site = formals
        .iter()
        .fold(CallSite::new([f.t, f.u]), |site, p| site.param(p.clone()));
    actuals
        .iter()
        .fold(site, |site, a| site.arg(a.clone()))
}

fn check_fixed_bounds(f: &Fixture, site: &CallSite, include_nullability: bool) -> Result<(), TestCaseError> {
    with_env(&f.table, include_nullability, |env| {
        let mut inferrer =
            Inferrer::new(env, site, Mode::Method).map_err(|e| TestCaseError::fail(e.to_string()))?;
        inferrer.infer();

        for idx in 0..inferrer.var_count() {
            let Some(fixed) = inferrer.bounds.fixed(idx) else {
                continue;
            };
            if fixed.from_function_type {
                continue;
            }
            let known = |b: &&Shape| {
                !inferrer.mentions_session_var(b) && !b.contains_error() && !b.is_function_type()
            };
            let bounds = inferrer.bounds.var(idx);
            let conversions = inferrer.env.conversions;

            for exact in bounds.exact.iter().filter(known) {
                prop_assert!(
                    exact.eq_ignoring_nullability(&fixed.ty),
                    "exact bound {exact:?} vs {:?}",
                    fixed.ty
                );
            }
            for lower in bounds.lower.iter().filter(known) {
                prop_assert!(
                    conversions.implicit_conversion_exists(lower, &fixed.ty, false),
                    "lower bound {lower:?} does not convert to {:?}",
                    fixed.ty
                );
            }
            for upper in bounds.upper.iter().filter(known) {
                prop_assert!(
                    conversions.implicit_conversion_exists(&fixed.ty, upper, false),
                    "{:?} does not convert to upper bound {upper:?}",
                    fixed.ty
                );
            }
        }
        Ok(())
    })
}

proptest! {
    #[test]
    fn sessions_are_deterministic((formals, actuals) in arb_call()) {
        let f = fixture();
        let site = call_site(&f, &formals, &actuals);
        let first = with_env(&f.table, true, |env| crate::infer_method(env, &site));
        let second = with_env(&f.table, true, |env| crate::infer_method(env, &site));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn fixed_types_satisfy_their_bounds(
        (formals, actuals) in arb_call(),
        include_nullability in prop::bool::ANY,
    ) {
        let f = fixture();
        let site = call_site(&f, &formals, &actuals);
        check_fixed_bounds(&f, &site, include_nullability)?;
    }
}

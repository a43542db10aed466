use proptest::{
    prelude::{any, prop, prop_oneof, Arbitrary, BoxedStrategy, Just, Strategy},
    sample::select,
};

use crate::{DefTable, NamedTy, Nullability, Shape, Ty, TyVar};

#[derive(Debug, Clone, Copy)]
pub struct RecursiveParams {
    pub depth: u32,
    pub desired_size: u32,
    pub expected_branch_size: u32,
}

impl Default for RecursiveParams {
    fn default() -> Self {
        Self {
            depth: 3,
            desired_size: 24,
            expected_branch_size: 2,
        }
    }
}

/// The building blocks generated shapes are made of. Shapes only make sense
/// against the table they were declared in, so strategies draw from a fixed
/// set of leaves and generic definitions rather than inventing ids.
#[derive(Debug, Clone)]
pub struct Universe {
    pub leaves: Vec<Shape>,
    /// Prototype uses of generic definitions; only the arity of `args` is
    /// read.
    pub generics: Vec<NamedTy>,
}

impl Universe {
    /// Primitives and the well-known collection and delegate definitions of
    /// `table`, plus `vars` as leaves.
    pub fn from_table(table: &DefTable, vars: &[TyVar]) -> Self {
        let mut leaves = vec![table.object(), table.string(), table.int(), table.long()];
        leaves.extend(vars.iter().copied().map(Shape::var));

        let wk = table.well_known();
        let object = table.object();
        let generics = [
            table.named(wk.ienumerable, [object.clone()]),
            table.named(wk.ilist, [object.clone()]),
            table.named(wk.ireadonly_list, [object.clone()]),
            table.func([object.clone()], object.clone()),
            table.action([object.clone()]),
        ]
        .into_iter()
        .filter_map(|s| s.as_named().cloned())
        .collect();
        Universe { leaves, generics }
    }
}

pub fn arb_shape(universe: Universe, params: RecursiveParams) -> BoxedStrategy<Shape> {
    let leaf = (select(universe.leaves.clone()), any::<Nullability>())
        .prop_map(|(shape, nullability)| shape.with_nullability(nullability));

    let generics = universe.generics;
    leaf.prop_recursive(
        params.depth,
        params.desired_size,
        params.expected_branch_size,
        move |inner| {
            let args_inner = inner.clone();
            let constructed = select(generics.clone()).prop_flat_map(move |proto| {
                prop::collection::vec(args_inner.clone(), proto.args.len()).prop_map(
                    move |args| {
                        Shape::new(Ty::Named(NamedTy {
                            args,
                            ..proto.clone()
                        }))
                    },
                )
            });
            prop_oneof![
                2 => constructed,
                1 => inner.clone().prop_map(Shape::array),
                1 => prop::collection::vec(inner.clone(), 2..4).prop_map(Shape::tuple),
            ]
        },
    )
    .boxed()
}

impl Arbitrary for Nullability {
    type Parameters = ();
    type Strategy = BoxedStrategy<Nullability>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            1 => Just(Nullability::Oblivious),
            3 => Just(Nullability::NotAnnotated),
            2 => Just(Nullability::Annotated),
        ]
        .boxed()
    }
}

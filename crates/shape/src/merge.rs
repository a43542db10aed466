use crate::{NamedTy, Shape, SigParam, Signature, Ty, Variance};

/// Merge two shapes that are equal modulo nullability (and dynamic vs
/// object), combining annotations according to the variance of each
/// position.
///
/// `variance` is the variance of the root position: `Out` joins, `In` meets,
/// `Invariant` keeps the first non oblivious annotation.
pub fn merge_equivalent(a: &Shape, b: &Shape, variance: Variance) -> Shape {
    let nullability = a.nullability().merge(b.nullability(), variance);
    let ty = match (a.ty(), b.ty()) {
        (Ty::Dynamic, _) | (_, Ty::Dynamic) => Ty::Dynamic,
        (Ty::Named(x), Ty::Named(y)) if x.def == y.def && x.args.len() == y.args.len() => {
            Ty::Named(NamedTy {
                def: x.def,
                kind: x.kind,
                args: x
                    .args
                    .iter()
                    .zip(&y.args)
                    .enumerate()
                    .map(|(idx, (xa, ya))| {
                        merge_equivalent(xa, ya, variance.compose(x.variance_at(idx)))
                    })
                    .collect(),
                variance: x.variance.clone(),
            })
        }
        (Ty::Array { elem: x, rank }, Ty::Array { elem: y, .. }) => Ty::Array {
            elem: merge_equivalent(x, y, variance),
            rank: *rank,
        },
        (Ty::Pointer(x), Ty::Pointer(y)) => {
            Ty::Pointer(merge_equivalent(x, y, Variance::Invariant))
        }
        (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => Ty::Tuple(
            xs.iter()
                .zip(ys)
                .map(|(x, y)| merge_equivalent(x, y, Variance::Invariant))
                .collect(),
        ),
        (Ty::FnPtr(x), Ty::FnPtr(y)) if x.params.len() == y.params.len() => {
            Ty::FnPtr(merge_signature(x, y, variance))
        }
        (Ty::Function(x), Ty::Function(y)) if x.params.len() == y.params.len() => {
            Ty::Function(merge_signature(x, y, variance))
        }
        _ => a.ty().clone(),
    };
    Shape::new(ty).with_nullability(nullability)
}

fn merge_signature(x: &Signature, y: &Signature, variance: Variance) -> Signature {
    Signature {
        params: x
            .params
            .iter()
            .zip(&y.params)
            .map(|(px, py)| SigParam {
                ty: merge_equivalent(&px.ty, &py.ty, variance.flip()),
                ref_kind: px.ref_kind,
            })
            .collect(),
        ret: merge_equivalent(&x.ret, &y.ret, variance),
        ret_ref: x.ret_ref,
        conv: x.conv,
    }
}

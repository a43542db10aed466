//! Pairwise decomposition of two shapes with the same outer constructor.
//!
//! Every function returns `None` when the constructors, arities, ranks or
//! calling conventions do not line up. A mismatch is never an error; the
//! caller simply tries the next inference rule.

use crate::{RefKind, Shape, Signature, Ty, Variance};

/// Element shapes of two arrays of the same rank.
pub fn array_elements(source: &Shape, target: &Shape) -> Option<(Shape, Shape)> {
    match (source.ty(), target.ty()) {
        (Ty::Array { elem: s, rank: rs }, Ty::Array { elem: t, rank: rt }) if rs == rt => {
            Some((s.clone(), t.clone()))
        }
        _ => None,
    }
}

/// Element pairs of two tuples of the same cardinality.
pub fn tuple_elements(source: &Shape, target: &Shape) -> Option<Vec<(Shape, Shape)>> {
    match (source.ty(), target.ty()) {
        (Ty::Tuple(s), Ty::Tuple(t)) if s.len() == t.len() => {
            Some(s.iter().cloned().zip(t.iter().cloned()).collect())
        }
        _ => None,
    }
}

/// Argument pairs of two uses of the same generic definition, tagged with the
/// declared variance of each position.
pub fn constructed_args(source: &Shape, target: &Shape) -> Option<Vec<(Shape, Shape, Variance)>> {
    let (s, t) = (source.as_named()?, target.as_named()?);
    if s.def != t.def || s.args.len() != t.args.len() {
        return None;
    }
    Some(
        s.args
            .iter()
            .zip(&t.args)
            .enumerate()
            .map(|(idx, (sa, ta))| (sa.clone(), ta.clone(), t.variance_at(idx)))
            .collect(),
    )
}

pub fn pointer_targets(source: &Shape, target: &Shape) -> Option<(Shape, Shape)> {
    match (source.ty(), target.ty()) {
        (Ty::Pointer(s), Ty::Pointer(t)) => Some((s.clone(), t.clone())),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePairs {
    /// `(source, target, ref kind)` per parameter.
    pub params: Vec<(Shape, Shape, RefKind)>,
    pub ret: (Shape, Shape, RefKind),
}

/// Parameter and return pairs of two signatures with the same parameter
/// count, ref kinds and calling convention.
pub fn signature_pairs(source: &Signature, target: &Signature) -> Option<SignaturePairs> {
    if source.params.len() != target.params.len()
        || source.ret_ref != target.ret_ref
        || source.conv != target.conv
    {
        return None;
    }
    if source
        .params
        .iter()
        .zip(&target.params)
        .any(|(s, t)| s.ref_kind != t.ref_kind)
    {
        return None;
    }
    Some(SignaturePairs {
        params: source
            .params
            .iter()
            .zip(&target.params)
            .map(|(s, t)| (s.ty.clone(), t.ty.clone(), s.ref_kind))
            .collect(),
        ret: (source.ret.clone(), target.ret.clone(), source.ret_ref),
    })
}

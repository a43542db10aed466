use itertools::Itertools;
use shape::{Conversions, Shape, Signature};

use crate::MethodGroup;

/// Picks the member of a method group a delegate (or function pointer) with
/// the given parameter types would bind to.
pub trait MethodGroupResolver {
    /// Return type of the chosen member, or `None` when no single member is
    /// applicable. `fn_ptr` is set when the target is a function pointer.
    fn resolve_return(&self, group: &MethodGroup, param_types: &[Shape], fn_ptr: bool)
        -> Option<Shape>;
}

/// Overload resolution reduced to what inference needs: arity, then
/// applicability by implicit conversion, then a unique identity match.
pub struct ApplicableMethodResolver<'a> {
    conversions: &'a dyn Conversions,
}

impl<'a> ApplicableMethodResolver<'a> {
    pub fn new(conversions: &'a dyn Conversions) -> Self {
        ApplicableMethodResolver { conversions }
    }

    fn applicable(&self, candidate: &Signature, param_types: &[Shape]) -> bool {
        candidate.params.len() == param_types.len()
            && candidate
                .params
                .iter()
                .zip(param_types)
                .all(|(param, arg)| {
                    self.conversions
                        .implicit_conversion_exists(arg, &param.ty, false)
                })
    }
}

impl MethodGroupResolver for ApplicableMethodResolver<'_> {
    fn resolve_return(
        &self,
        group: &MethodGroup,
        param_types: &[Shape],
        fn_ptr: bool,
    ) -> Option<Shape> {
        if group.address_of != fn_ptr {
            return None;
        }
        let applicable = group
            .candidates
            .iter()
            .filter(|c| self.applicable(c, param_types))
            .collect_vec();
        match applicable.as_slice() {
            [] => None,
            [only] => Some(only.ret.clone()),
            many => {
                let exact = many
                    .iter()
                    .filter(|c| {
                        c.param_types()
                            .zip(param_types)
                            .all(|(p, a)| p.eq_ignoring_nullability(a))
                    })
                    .collect_vec();
                if let [only] = exact.as_slice() {
                    Some(only.ret.clone())
                } else {
                    log::trace!(
                        "method group {} is ambiguous for {param_types:?}",
                        group.name
                    );
                    None
                }
            }
        }
    }
}

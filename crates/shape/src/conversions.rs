// ==========================================================================
// Conversion oracle
// ==========================================================================
//
// The engine only needs one question answered: does an implicit conversion
// from one shape to another exist? `StandardConversions` answers it from a
// `DefTable` with the usual rules: identity, numeric widening, nullable
// wrapping, boxing, reference conversions through the base chain and
// interfaces (variance aware), array covariance, tuples, function types to
// delegates, function pointer variance and dynamic.

use crate::{
    decompose, DefTable, Nullability, RefKind, Shape, Ty, TypeStructure, Variance,
};

pub trait Conversions {
    /// True if `from` implicitly converts to `to`. With `include_nullability`
    /// an annotated source never converts to a not-annotated destination and
    /// nested annotations have to agree.
    fn implicit_conversion_exists(&self, from: &Shape, to: &Shape, include_nullability: bool)
        -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct StandardConversions<'a> {
    table: &'a DefTable,
}

impl<'a> StandardConversions<'a> {
    pub fn new(table: &'a DefTable) -> Self {
        StandardConversions { table }
    }
}

impl Conversions for StandardConversions<'_> {
    fn implicit_conversion_exists(
        &self,
        from: &Shape,
        to: &Shape,
        include_nullability: bool,
    ) -> bool {
        if include_nullability && !top_level_nullability_converts(from, to) {
            return false;
        }
        self.implicit(from, to, include_nullability)
    }
}

fn top_level_nullability_converts(from: &Shape, to: &Shape) -> bool {
    !(from.nullability() == Nullability::Annotated
        && to.nullability() == Nullability::NotAnnotated)
}

/// Nested annotations agree when equal or when either side is oblivious.
fn nested_nullability_agrees(a: &Shape, b: &Shape) -> bool {
    a.ty()
        .children()
        .into_iter()
        .zip(b.ty().children())
        .all(|(ca, cb)| annotations_agree(ca, cb) && nested_nullability_agrees(ca, cb))
}

fn annotations_agree(a: &Shape, b: &Shape) -> bool {
    a.nullability() == b.nullability()
        || a.nullability() == Nullability::Oblivious
        || b.nullability() == Nullability::Oblivious
}

impl StandardConversions<'_> {
    fn is_object(&self, shape: &Shape) -> bool {
        shape
            .as_named()
            .is_some_and(|n| n.def == self.table.well_known().object)
    }

    fn identical(&self, a: &Shape, b: &Shape, nullable: bool) -> bool {
        if (a.is_dynamic() && self.is_object(b)) || (self.is_object(a) && b.is_dynamic()) {
            return true;
        }
        a.eq_ignoring_nullability(b) && (!nullable || nested_nullability_agrees(a, b))
    }

    fn implicit(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        if self.identical(from, to, nullable) {
            return true;
        }
        match (from.ty(), to.ty()) {
            (Ty::Error(_), _) | (_, Ty::Error(_)) => false,
            (Ty::Pointer(_) | Ty::FnPtr(_), Ty::Dynamic) => false,
            (_, Ty::Dynamic) | (Ty::Dynamic, _) => true,
            (Ty::Tuple(xs), Ty::Tuple(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|(x, y)| self.implicit(x, y, nullable))
            }
            (Ty::Function(_), _) => self.function_type_converts(from, to, nullable),
            (Ty::FnPtr(_), Ty::FnPtr(_)) => self.fn_ptr_converts(from, to, nullable),
            _ => {
                self.numeric_widens(from, to)
                    || self.nullable_wraps(from, to)
                    || self.reference_or_boxing(from, to, nullable)
            }
        }
    }

    fn numeric_widens(&self, from: &Shape, to: &Shape) -> bool {
        let wk = self.table.well_known();
        match (from.as_named(), to.as_named()) {
            (Some(f), Some(t)) => matches!(
                (wk.numeric_rank(f.def), wk.numeric_rank(t.def)),
                (Some(a), Some(b)) if a < b
            ),
            _ => false,
        }
    }

    /// `T` to `Nullable<U>` and `Nullable<T>` to `Nullable<U>` when `T`
    /// converts to `U` by identity or widening.
    fn nullable_wraps(&self, from: &Shape, to: &Shape) -> bool {
        let Some(target) = self.table.nullable_underlying(to) else {
            return false;
        };
        let source = match self.table.nullable_underlying(from) {
            Some(inner) => inner,
            None if from.is_value_type() => from.clone(),
            None => return false,
        };
        self.identical(&source, &target, false) || self.numeric_widens(&source, &target)
    }

    fn reference_or_boxing(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        if self.is_object(to) {
            return !matches!(from.ty(), Ty::Pointer(_) | Ty::FnPtr(_)) && !self.table.is_void(from);
        }
        if let Some((fe, te)) = decompose::array_elements(from, to) {
            return self.table.is_reference_type(&fe)
                && (self.identical(&fe, &te, nullable) || self.reference_converts(&fe, &te, nullable));
        }
        if to.as_named().is_none() {
            return false;
        }
        let chain = self.table.base_chain(from);
        if chain.iter().any(|b| self.variance_converts(b, to, nullable)) {
            return true;
        }
        self.table
            .all_interfaces(from)
            .iter()
            .any(|iface| self.variance_converts(iface, to, nullable))
    }

    /// A reference conversion between two reference types.
    fn reference_converts(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        self.table.is_reference_type(from) && self.implicit(from, to, nullable)
    }

    /// Same generic definition, each argument identical or convertible in the
    /// direction its declared variance allows.
    fn variance_converts(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        let Some(pairs) = decompose::constructed_args(from, to) else {
            return false;
        };
        pairs.iter().all(|(a, b, variance)| {
            let annotations_ok = !nullable
                || match variance {
                    Variance::Invariant => annotations_agree(a, b),
                    Variance::Out => top_level_nullability_converts(a, b),
                    Variance::In => top_level_nullability_converts(b, a),
                };
            annotations_ok
                && (self.identical(a, b, nullable)
                    || match variance {
                        Variance::Invariant => false,
                        Variance::Out => self.reference_converts(a, b, nullable),
                        Variance::In => self.reference_converts(b, a, nullable),
                    })
        })
    }

    fn function_type_converts(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        if self.is_object(to) {
            return true;
        }
        let (Some(source), Some(target)) =
            (from.as_function_type(), self.table.delegate_signature(to))
        else {
            return false;
        };
        let Some(pairs) = decompose::signature_pairs(source, &target) else {
            return false;
        };
        pairs
            .params
            .iter()
            .all(|(s, t, _)| self.identical(s, t, false))
            && self.return_converts(&pairs.ret.0, &pairs.ret.1, nullable)
    }

    fn return_converts(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        self.identical(from, to, false)
            || (self.table.is_reference_type(from) && self.implicit(from, to, nullable))
    }

    fn fn_ptr_converts(&self, from: &Shape, to: &Shape, nullable: bool) -> bool {
        let (Ty::FnPtr(source), Ty::FnPtr(target)) = (from.ty(), to.ty()) else {
            return false;
        };
        let Some(pairs) = decompose::signature_pairs(source, target) else {
            return false;
        };
        let params_ok = pairs.params.iter().all(|(s, t, ref_kind)| {
            self.identical(s, t, nullable)
                || (*ref_kind == RefKind::None && self.reference_converts(t, s, nullable))
        });
        let (s, t, ref_kind) = &pairs.ret;
        params_ok
            && (self.identical(s, t, nullable)
                || (*ref_kind == RefKind::None && self.reference_converts(s, t, nullable)))
    }
}

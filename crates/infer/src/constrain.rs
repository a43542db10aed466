// ==========================================================================
// Structural inference
// ==========================================================================
//
// infer_bounds(kind, source, target) walks `target` looking for unfixed
// session variables and records what `source` says about them:
//
//   Exact       source and target are the same type
//   LowerBound  source converts to target
//   UpperBound  target converts to source
//
// Positions are matched structurally: nullable wrappers, arrays, tuples,
// uses of the same generic definition, pointers and function pointers. When
// two named types come from different definitions the base chain or the
// interface set is searched for a use of the other definition. A shape pair
// that lines up nowhere contributes nothing.

use shape::{
    array_elements, constructed_args, merge_equivalent, pointer_targets, signature_pairs,
    tuple_elements, DefKind, NamedTy, RefKind, Shape, Ty, Variance,
};

use crate::{BoundKind, Inferrer};

/// Base chains are followed at most this far.
const MAX_BASE_DEPTH: usize = 64;

impl Inferrer<'_> {
    pub(crate) fn infer_bounds(&mut self, kind: BoundKind, source: &Shape, target: &Shape) {
        match kind {
            // Shape bounds are only ever recorded directly; structurally they
            // pin positions like an exact bound.
            BoundKind::Exact | BoundKind::Shape => self.exact_inference(source, target),
            BoundKind::LowerBound => self.lower_bound_inference(source, target),
            BoundKind::UpperBound => self.upper_bound_inference(source, target),
        }
    }

    /// False if this exact pair has been inferred before in this session.
    fn first_visit(&mut self, kind: BoundKind, source: &Shape, target: &Shape) -> bool {
        self.seen.insert((kind, source.clone(), target.clone()))
    }

    fn type_variable_inference(&mut self, kind: BoundKind, source: &Shape, target: &Shape) -> bool {
        match self.unfixed_index(target) {
            Some(idx) => {
                self.add_bound_and_infer(source.clone(), idx, kind);
                true
            }
            None => false,
        }
    }

    /// `Nullable<X>` against `Nullable<Y>`, and `X?` against `Y?`, compare
    /// the underlying types.
    fn nullable_inference(&mut self, kind: BoundKind, source: &Shape, target: &Shape) -> bool {
        let types = self.env.types;
        if let (Some(s), Some(t)) = (
            types.nullable_underlying(source),
            types.nullable_underlying(target),
        ) {
            self.infer_bounds(kind, &s, &t);
            return true;
        }
        if source.is_annotated() && target.is_annotated() {
            self.infer_bounds(kind, &source.not_annotated(), &target.not_annotated());
            return true;
        }
        false
    }

    /// Reference types (and function pointers) passed by value keep their
    /// variance; everything else is matched exactly.
    fn is_variant(&self, shape: &Shape, ref_kind: RefKind) -> bool {
        (self.env.types.is_reference_type(shape) || shape.is_fn_ptr()) && !ref_kind.is_by_ref()
    }

    /// Element type of `other` that corresponds to the elements of an array
    /// of `rank`.
    fn matching_element_type(&self, rank: u32, other: &Shape) -> Option<Shape> {
        match other.ty() {
            Ty::Array { elem, rank: r } if *r == rank => Some(elem.clone()),
            Ty::Array { .. } => None,
            _ if rank == 1 && self.env.types.is_array_generic_interface(other) => {
                other.as_named().and_then(|n| n.args.first().cloned())
            }
            _ => None,
        }
    }

    // ======================================================================
    // Exact
    // ======================================================================

    pub(crate) fn exact_inference(&mut self, source: &Shape, target: &Shape) {
        if !self.first_visit(BoundKind::Exact, source, target) {
            return;
        }
        if self.nullable_inference(BoundKind::Exact, source, target)
            || self.type_variable_inference(BoundKind::Exact, source, target)
        {
            return;
        }

        if let Some((s, t)) = array_elements(source, target) {
            self.exact_inference(&s, &t);
        } else if let Some(args) = constructed_args(source, target) {
            for (s, t, _) in args {
                self.exact_inference(&s, &t);
            }
        } else if let Some(elems) = tuple_elements(source, target) {
            for (s, t) in elems {
                self.exact_inference(&s, &t);
            }
        } else if let Some((s, t)) = pointer_targets(source, target) {
            self.exact_inference(&s, &t);
        } else if let (Ty::FnPtr(s), Ty::FnPtr(t)) = (source.ty(), target.ty()) {
            let Some(pairs) = signature_pairs(s, t) else {
                return;
            };
            for (s, t, _) in pairs.params {
                self.exact_inference(&s, &t);
            }
            let (s, t, _) = pairs.ret;
            self.exact_inference(&s, &t);
        } else {
            self.no_match(BoundKind::Exact, source, target);
        }
    }

    // ======================================================================
    // Lower bounds
    // ======================================================================

    pub(crate) fn lower_bound_inference(&mut self, source: &Shape, target: &Shape) {
        if !self.first_visit(BoundKind::LowerBound, source, target) {
            return;
        }
        if self.nullable_inference(BoundKind::LowerBound, source, target)
            || self.type_variable_inference(BoundKind::LowerBound, source, target)
            || self.lower_bound_array_inference(source, target)
        {
            return;
        }

        if let Some(elems) = tuple_elements(source, target) {
            for (s, t) in elems {
                self.lower_bound_inference(&s, &t);
            }
            return;
        }

        if !self.lower_bound_constructed_inference(source, target)
            && !self.lower_bound_fn_ptr_inference(source, target)
        {
            self.no_match(BoundKind::LowerBound, source, target);
        }
    }

    /// `X[]` against `Y[]` of the same rank, or against `IEnumerable<Y>` and
    /// the other generic interfaces of a single dimension array.
    fn lower_bound_array_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Ty::Array { elem, rank } = source.ty() else {
            return false;
        };
        let Some(target_elem) = self.matching_element_type(*rank, target) else {
            return false;
        };
        if self.env.types.is_reference_type(elem) {
            self.lower_bound_inference(elem, &target_elem);
        } else {
            self.exact_inference(elem, &target_elem);
        }
        true
    }

    fn lower_bound_constructed_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Some(named_target) = target.as_named() else {
            return false;
        };
        if named_target.args.is_empty() {
            return false;
        }

        if let Some(args) = constructed_args(source, target) {
            if source.as_named().is_some_and(NamedTy::is_interface_or_delegate) {
                self.lower_bound_type_argument_inference(args);
            } else {
                for (s, t, _) in args {
                    self.exact_inference(&s, &t);
                }
            }
            return true;
        }

        self.lower_bound_class_inference(source, target)
            || self.lower_bound_interface_inference(source, target)
    }

    /// Look for a use of the target's class in the source's base chain.
    fn lower_bound_class_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        if target.as_named().map(|n| n.kind) != Some(DefKind::Class) {
            return false;
        }
        let source_is_class = match source.ty() {
            Ty::Named(named) => named.kind == DefKind::Class,
            Ty::Var(_) => true,
            _ => false,
        };
        if !source_is_class {
            return false;
        }

        let types = self.env.types;
        let matching = std::iter::successors(types.base_type(source), |base| types.base_type(base))
            .take(MAX_BASE_DEPTH)
            .find_map(|base| constructed_args(&base, target));
        match matching {
            Some(args) => {
                for (s, t, _) in args {
                    self.exact_inference(&s, &t);
                }
                true
            }
            None => false,
        }
    }

    /// Look for the single use of the target's interface among everything
    /// the source implements.
    fn lower_bound_interface_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Some(named_target) = target.as_named() else {
            return false;
        };
        if named_target.kind != DefKind::Interface {
            return false;
        }
        let searchable = match source.ty() {
            Ty::Named(named) => matches!(
                named.kind,
                DefKind::Struct | DefKind::Class | DefKind::Interface
            ),
            Ty::Var(_) => true,
            _ => false,
        };
        if !searchable {
            return false;
        }

        let interfaces = merge_modulo_nullability(self.env.types.all_interfaces(source), Variance::In);
        let Some(matching) = unique_interface(&interfaces, named_target) else {
            return false;
        };
        match constructed_args(&matching, target) {
            Some(args) => {
                self.lower_bound_type_argument_inference(args);
                true
            }
            None => false,
        }
    }

    fn lower_bound_type_argument_inference(&mut self, args: Vec<(Shape, Shape, Variance)>) {
        for (s, t, variance) in args {
            let reference = self.env.types.is_reference_type(&s);
            match variance {
                Variance::Out if reference => self.lower_bound_inference(&s, &t),
                Variance::In if reference => self.upper_bound_inference(&s, &t),
                _ => self.exact_inference(&s, &t),
            }
        }
    }

    /// Parameters are contravariant, the return covariant.
    fn lower_bound_fn_ptr_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let (Ty::FnPtr(s), Ty::FnPtr(t)) = (source.ty(), target.ty()) else {
            return false;
        };
        let Some(pairs) = signature_pairs(s, t) else {
            return false;
        };
        for (s, t, ref_kind) in pairs.params {
            if self.is_variant(&s, ref_kind) {
                self.upper_bound_inference(&s, &t);
            } else {
                self.exact_inference(&s, &t);
            }
        }
        let (s, t, ref_kind) = pairs.ret;
        if self.is_variant(&s, ref_kind) {
            self.lower_bound_inference(&s, &t);
        } else {
            self.exact_inference(&s, &t);
        }
        true
    }

    // ======================================================================
    // Upper bounds
    // ======================================================================

    pub(crate) fn upper_bound_inference(&mut self, source: &Shape, target: &Shape) {
        if !self.first_visit(BoundKind::UpperBound, source, target) {
            return;
        }
        if self.nullable_inference(BoundKind::UpperBound, source, target)
            || self.type_variable_inference(BoundKind::UpperBound, source, target)
            || self.upper_bound_array_inference(source, target)
        {
            return;
        }

        // Tuples are value types; their elements never vary.
        if let Some(elems) = tuple_elements(source, target) {
            for (s, t) in elems {
                self.exact_inference(&s, &t);
            }
            return;
        }

        if !self.upper_bound_constructed_inference(source, target)
            && !self.upper_bound_fn_ptr_inference(source, target)
        {
            self.no_match(BoundKind::UpperBound, source, target);
        }
    }

    fn upper_bound_array_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Ty::Array { elem, rank } = target.ty() else {
            return false;
        };
        let Some(source_elem) = self.matching_element_type(*rank, source) else {
            return false;
        };
        if self.env.types.is_reference_type(&source_elem) {
            self.upper_bound_inference(&source_elem, elem);
        } else {
            self.exact_inference(&source_elem, elem);
        }
        true
    }

    fn upper_bound_constructed_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Some(named_source) = source.as_named() else {
            return false;
        };
        if named_source.args.is_empty() {
            return false;
        }

        if let Some(args) = constructed_args(source, target) {
            if target.as_named().is_some_and(NamedTy::is_interface_or_delegate) {
                self.upper_bound_type_argument_inference(args);
            } else {
                for (s, t, _) in args {
                    self.exact_inference(&s, &t);
                }
            }
            return true;
        }

        self.upper_bound_class_inference(source, target)
            || self.upper_bound_interface_inference(source, target)
    }

    /// Look for a use of the source's class in the target's base chain.
    fn upper_bound_class_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let is_class = |shape: &Shape| shape.as_named().map(|n| n.kind) == Some(DefKind::Class);
        if !is_class(source) || !is_class(target) {
            return false;
        }

        let types = self.env.types;
        let matching = std::iter::successors(types.base_type(target), |base| types.base_type(base))
            .take(MAX_BASE_DEPTH)
            .find_map(|base| constructed_args(source, &base));
        match matching {
            Some(args) => {
                for (s, t, _) in args {
                    self.exact_inference(&s, &t);
                }
                true
            }
            None => false,
        }
    }

    fn upper_bound_interface_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let Some(named_source) = source.as_named() else {
            return false;
        };
        if named_source.kind != DefKind::Interface {
            return false;
        }
        let searchable = target.as_named().is_some_and(|n| {
            matches!(n.kind, DefKind::Struct | DefKind::Class | DefKind::Interface)
        });
        if !searchable {
            return false;
        }

        let interfaces = merge_modulo_nullability(self.env.types.all_interfaces(target), Variance::Out);
        let Some(best) = unique_interface(&interfaces, named_source) else {
            return false;
        };
        match constructed_args(source, &best) {
            Some(args) => {
                self.upper_bound_type_argument_inference(args);
                true
            }
            None => false,
        }
    }

    fn upper_bound_type_argument_inference(&mut self, args: Vec<(Shape, Shape, Variance)>) {
        for (s, t, variance) in args {
            let reference = self.env.types.is_reference_type(&s);
            match variance {
                Variance::Out if reference => self.upper_bound_inference(&s, &t),
                Variance::In if reference => self.lower_bound_inference(&s, &t),
                _ => self.exact_inference(&s, &t),
            }
        }
    }

    fn upper_bound_fn_ptr_inference(&mut self, source: &Shape, target: &Shape) -> bool {
        let (Ty::FnPtr(s), Ty::FnPtr(t)) = (source.ty(), target.ty()) else {
            return false;
        };
        let Some(pairs) = signature_pairs(s, t) else {
            return false;
        };
        for (s, t, ref_kind) in pairs.params {
            if self.is_variant(&s, ref_kind) {
                self.lower_bound_inference(&s, &t);
            } else {
                self.exact_inference(&s, &t);
            }
        }
        let (s, t, ref_kind) = pairs.ret;
        if self.is_variant(&s, ref_kind) {
            self.upper_bound_inference(&s, &t);
        } else {
            self.exact_inference(&s, &t);
        }
        true
    }

    fn no_match(&self, kind: BoundKind, source: &Shape, target: &Shape) {
        if self.mentions_unfixed_var(target) {
            log::trace!(
                "{kind:?}: {} does not line up with {}",
                self.type_name(source),
                self.type_name(target)
            );
        }
    }
}

/// Collapse interfaces that differ only in nullable annotations into one,
/// merging the annotations with `variance`.
fn merge_modulo_nullability(interfaces: Vec<Shape>, variance: Variance) -> Vec<Shape> {
    let mut merged: Vec<Shape> = Vec::with_capacity(interfaces.len());
    for iface in interfaces {
        match merged.iter_mut().find(|m| m.eq_ignoring_nullability(&iface)) {
            Some(found) => *found = merge_equivalent(found, &iface, variance),
            None => merged.push(iface),
        }
    }
    merged
}

/// The one use of `target`'s definition in `interfaces`. Two different uses
/// (say `IEnumerable<int>` and `IEnumerable<string>`) give nothing.
fn unique_interface(interfaces: &[Shape], target: &NamedTy) -> Option<Shape> {
    let mut matching: Option<&Shape> = None;
    for iface in interfaces {
        if iface.as_named().map(|n| n.def) != Some(target.def) {
            continue;
        }
        match matching {
            None => matching = Some(iface),
            Some(found) if found != iface => return None,
            Some(_) => {}
        }
    }
    matching.cloned()
}

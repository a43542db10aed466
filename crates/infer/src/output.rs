// ==========================================================================
// Argument-driven inference
// ==========================================================================
//
// Phase one turns each argument into bounds without looking inside lambda
// bodies: explicit lambda parameter and return types, collection and tuple
// literals element by element, and the type of every typed argument.
//
// Phase two revisits lambdas and method groups whose target delegate has all
// its inputs fixed but still has unfixed variables in its output, and turns
// the inferred return type into a lower bound.

use call_site::{Arg, CollectionElement, Lambda, MethodGroup};
use itertools::Itertools;
use shape::{Shape, Signature, Ty};

use crate::{deps::DependencyGraph, BoundKind, Inferrer};

impl Inferrer<'_> {
    /// Neither an error nor `void`.
    pub(crate) fn is_really_a_type(&self, shape: &Shape) -> bool {
        !shape.is_error() && !self.env.types.is_void(shape)
    }

    /// Signature of a delegate (or function pointer) target, with a flag
    /// for the function pointer case.
    fn delegate_or_fn_ptr(&self, target: &Shape) -> Option<(Signature, bool)> {
        match target.ty() {
            Ty::FnPtr(sig) => Some((sig.clone(), true)),
            _ => self.env.types.delegate_signature(target).map(|sig| (sig, false)),
        }
    }

    /// The signature a lambda or method group argument is converted to, if
    /// the target is something it can convert to.
    fn function_target(&self, source: &Arg, target: &Shape) -> Option<Signature> {
        let (sig, fn_ptr) = self.delegate_or_fn_ptr(target)?;
        let fits = match source {
            Arg::MethodGroup(group) => group.address_of == fn_ptr,
            Arg::Lambda(_) => !fn_ptr,
            _ => false,
        };
        fits.then_some(sig)
    }

    // ======================================================================
    // Phase one
    // ======================================================================

    pub(crate) fn explicit_inference(&mut self, source: &Arg, target: &Shape, kind: BoundKind) {
        match source {
            Arg::Lambda(lambda) if self.env.types.delegate_signature(target).is_some() => {
                self.explicit_parameter_inference(lambda, target);
                self.explicit_return_inference(lambda, target);
            }
            Arg::Collection(elems) => self.collection_inference(elems, target, kind),
            Arg::Tuple(elems)
                if source.natural_type().is_none()
                    && tuple_arity(target) == Some(elems.len()) =>
            {
                self.tuple_literal_inference(elems, target, kind);
            }
            _ => self.typed_inference(source, target, kind),
        }
    }

    fn typed_inference(&mut self, source: &Arg, target: &Shape, kind: BoundKind) {
        match source.natural_type() {
            Some(ty) if self.is_really_a_type(&ty) => self.infer_bounds(kind, &ty, target),
            _ => {
                if kind != BoundKind::LowerBound || target.is_annotated() {
                    return;
                }
                if let Some(idx) = self.unfixed_index(target) {
                    self.bounds.add_nullable_hint(idx, source.nullability_hint());
                }
            }
        }
    }

    /// `(int x) => ...` passed as `Func<T, U>` pins `T` to `int`.
    fn explicit_parameter_inference(&mut self, lambda: &Lambda, target: &Shape) {
        let Some(explicit) = lambda.explicit_params() else {
            return;
        };
        let Some(sig) = self.env.types.delegate_signature(target) else {
            return;
        };
        for (param, declared) in explicit.iter().zip(&sig.params) {
            self.exact_inference(&param.ty, &declared.ty);
        }
    }

    fn explicit_return_inference(&mut self, lambda: &Lambda, target: &Shape) {
        let Some(ret) = &lambda.explicit_return else {
            return;
        };
        let Some(sig) = self.env.types.delegate_signature(target) else {
            return;
        };
        self.exact_inference(ret, &sig.ret);
    }

    fn collection_inference(&mut self, elems: &[CollectionElement], target: &Shape, kind: BoundKind) {
        if elems.is_empty() {
            return;
        }
        let Some(elem_target) = self.collection_element_target(target) else {
            return;
        };
        for elem in elems {
            match elem {
                CollectionElement::Expr(arg) => self.explicit_inference(arg, &elem_target, kind),
                CollectionElement::Spread(Some(elem_ty)) => {
                    self.lower_bound_inference(elem_ty, &elem_target)
                }
                CollectionElement::Spread(None) => {}
            }
        }
    }

    fn collection_element_target(&self, target: &Shape) -> Option<Shape> {
        let types = self.env.types;
        let stripped = types.nullable_underlying(target);
        types.iteration_element_type(stripped.as_ref().unwrap_or(target))
    }

    fn tuple_literal_inference(&mut self, elems: &[Arg], target: &Shape, kind: BoundKind) {
        let Ty::Tuple(targets) = target.ty() else {
            return;
        };
        for (elem, elem_target) in elems.iter().zip_eq(targets) {
            self.explicit_inference(elem, elem_target, kind);
        }
    }

    // ======================================================================
    // Dependencies between lambda inputs and outputs
    // ======================================================================

    fn has_unfixed_in_input(&self, source: &Arg, target: &Shape) -> bool {
        self.function_target(source, target)
            .is_some_and(|sig| sig.param_types().any(|p| self.mentions_unfixed_var(p)))
    }

    fn has_unfixed_in_output(&self, source: &Arg, target: &Shape) -> bool {
        self.function_target(source, target)
            .is_some_and(|sig| self.mentions_unfixed_var(&sig.ret))
    }

    /// `i` depends on `j` when some lambda or method group needs `j` as a
    /// parameter type to produce a return type mentioning `i`.
    pub(crate) fn function_dependencies(&self) -> DependencyGraph {
        let signatures: Vec<Signature> = self
            .triples
            .iter()
            .filter_map(|t| self.function_target(&t.source, &t.target))
            .collect();
        DependencyGraph::from_direct(self.var_count(), |i, j| {
            signatures.iter().any(|sig| {
                sig.param_types().any(|p| p.contains_var(self.vars[j]))
                    && sig.ret.contains_var(self.vars[i])
            })
        })
    }

    // ======================================================================
    // Phase two
    // ======================================================================

    pub(crate) fn output_inferences(&mut self) {
        let triples = self.triples.clone();
        for triple in triples.iter() {
            self.output_inference_for(&triple.source, &triple.target);
        }
    }

    fn output_inference_for(&mut self, source: &Arg, target: &Shape) {
        match source {
            Arg::Tuple(elems) if source.natural_type().is_none() => {
                let Ty::Tuple(targets) = target.ty() else {
                    return;
                };
                if targets.len() != elems.len() {
                    return;
                }
                for (elem, elem_target) in elems.iter().zip_eq(targets) {
                    self.output_inference_for(elem, elem_target);
                }
            }
            Arg::Collection(elems) => {
                if elems.is_empty() {
                    return;
                }
                let Some(elem_target) = self.collection_element_target(target) else {
                    return;
                };
                for elem in elems {
                    if let CollectionElement::Expr(arg) = elem {
                        self.output_inference_for(arg, &elem_target);
                    }
                }
            }
            _ => {
                if self.has_unfixed_in_output(source, target)
                    && !self.has_unfixed_in_input(source, target)
                {
                    self.output_type_inference(source, target);
                }
            }
        }
    }

    fn output_type_inference(&mut self, source: &Arg, target: &Shape) {
        if self.inferred_return_type_inference(source, target)
            || self.method_group_return_type_inference(source, target)
        {
            return;
        }
        if let Some(ty) = source.natural_type() {
            self.lower_bound_inference(&ty, target);
        }
    }

    fn inferred_return_type_inference(&mut self, source: &Arg, target: &Shape) -> bool {
        let Arg::Lambda(lambda) = source else {
            return false;
        };
        let Some(sig) = self.env.types.delegate_signature(target) else {
            return false;
        };
        if self.env.types.is_void(&sig.ret) {
            return false;
        }
        let Some(ret) = self.infer_return_type(lambda, target) else {
            return false;
        };
        self.lower_bound_inference(&ret, &sig.ret);
        true
    }

    /// Type the lambda body against the target delegate with every fixed
    /// variable substituted.
    fn infer_return_type(&self, lambda: &Lambda, target: &Shape) -> Option<Shape> {
        let fixed = self
            .env
            .types
            .delegate_signature(&target.substitute(&self.subst))?;
        if fixed.params.len() != lambda.arity() {
            return None;
        }
        if let Some(explicit) = lambda.explicit_params() {
            let matches = explicit
                .iter()
                .zip(&fixed.params)
                .all(|(e, f)| e.ty.eq_ignoring_nullability(&f.ty));
            if !matches {
                return None;
            }
        }
        let params: Vec<Shape> = fixed.param_types().cloned().collect();
        let ret = lambda.infer_return(&params)?;
        // A body returning another lambda gives no usable type.
        (!ret.is_function_type()).then_some(ret)
    }

    fn method_group_return_type_inference(&mut self, source: &Arg, target: &Shape) -> bool {
        let Arg::MethodGroup(group) = source else {
            return false;
        };
        let Some((sig, fn_ptr)) = self.delegate_or_fn_ptr(target) else {
            return false;
        };
        if fn_ptr != group.address_of || self.env.types.is_void(&sig.ret) {
            return false;
        }
        let Some(ret) = self.method_group_return_type(group, target, fn_ptr) else {
            return false;
        };
        if self.env.types.is_void(&ret) {
            return false;
        }
        self.lower_bound_inference(&ret, &sig.ret);
        true
    }

    fn method_group_return_type(
        &self,
        group: &MethodGroup,
        target: &Shape,
        fn_ptr: bool,
    ) -> Option<Shape> {
        let (fixed, _) = self.delegate_or_fn_ptr(&target.substitute(&self.subst))?;
        let params: Vec<Shape> = fixed.param_types().cloned().collect();
        let ret = self.env.methods.resolve_return(group, &params, fn_ptr);
        if ret.is_none() {
            log::trace!("method group {} has no single match for {params:?}", group.name);
        }
        ret
    }
}

fn tuple_arity(shape: &Shape) -> Option<usize> {
    match shape.ty() {
        Ty::Tuple(elems) => Some(elems.len()),
        _ => None,
    }
}

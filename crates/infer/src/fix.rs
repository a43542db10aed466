// ==========================================================================
// Fixing
// ==========================================================================
//
// Turn the bounds of one variable into a single type:
//
//   1. Drop bounds that still mention a session variable or an error, and
//      function types that cannot win.
//   2. Candidates come from the shape alone if there is one, else from the
//      exact bounds (which must agree), else from the lower and upper
//      bounds. Candidates are keyed modulo nullability, with dynamic and
//      object being the same key.
//   3. Every lower bound has to convert to a candidate and every upper
//      bound has to accept it; candidates that fail are dropped.
//   4. The winner is the unique candidate every other candidate converts
//      to.

use shape::{merge_equivalent, Nullability, Shape, Variance};

use crate::{bounds::Fixed, InferenceFailure, Inferrer};

/// Insertion-ordered candidate types, each stored under its key.
#[derive(Debug)]
struct Candidates {
    object: Shape,
    entries: Vec<(Shape, Shape)>,
}

impl Candidates {
    fn new(object: Shape) -> Self {
        Candidates {
            object: object.erase_nullability(),
            entries: Vec::new(),
        }
    }

    /// Nullability erased everywhere and `dynamic` read as `object`.
    fn key(&self, shape: &Shape) -> Shape {
        if shape.is_dynamic() {
            return self.object.clone();
        }
        Shape::new(shape.ty().map_children(|child| self.key(child)))
            .with_nullability(Nullability::Oblivious)
    }

    fn position(&self, shape: &Shape) -> Option<usize> {
        let key = self.key(shape);
        self.entries.iter().position(|(k, _)| *k == key)
    }

    fn get(&self, shape: &Shape) -> Option<&Shape> {
        self.position(shape).map(|idx| &self.entries[idx].1)
    }

    fn insert(&mut self, shape: Shape) {
        debug_assert!(self.position(&shape).is_none());
        self.entries.push((self.key(&shape), shape));
    }

    fn replace(&mut self, key: &Shape, value: Shape) {
        if let Some(idx) = self.position(key) {
            self.entries[idx].1 = value;
        }
    }

    fn remove(&mut self, shape: &Shape) {
        if let Some(idx) = self.position(shape) {
            self.entries.remove(idx);
        }
    }

    fn same_key(&self, a: &Shape, b: &Shape) -> bool {
        self.key(a) == self.key(b)
    }

    fn values(&self) -> Vec<Shape> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Inferrer<'_> {
    /// Fix variable `idx`, recording the failure if it has no best type.
    pub(crate) fn fix(&mut self, idx: usize) -> bool {
        match self.best_type(idx) {
            Ok(fixed) => {
                log::debug!(
                    "fixed {:?} to {}{}",
                    self.vars[idx],
                    self.type_name(&fixed.ty),
                    if fixed.from_function_type {
                        " (function type)"
                    } else {
                        ""
                    }
                );
                self.subst.insert(self.vars[idx], fixed.ty.clone());
                self.bounds.fix(idx, fixed);
                self.update_bounds_after_fix(idx);
                true
            }
            Err(failure) => {
                log::debug!("cannot fix {:?}: {failure}", self.vars[idx]);
                self.failures.push(failure);
                false
            }
        }
    }

    fn best_type(&self, idx: usize) -> Result<Fixed, InferenceFailure> {
        let var = self.vars[idx];
        let types = self.env.types;
        let recorded = self.bounds.var(idx);
        let shape = recorded.shape.clone();

        let mut exact = recorded.exact.clone();
        if let Some(shape) = &shape {
            if !exact.contains(shape) {
                exact.push(shape.clone());
            }
        }
        let mut lower = recorded.lower.clone();
        let mut upper = recorded.upper.clone();

        // A lambda's function type only wins when nothing else is known.
        let has_other = |set: &[Shape]| set.iter().any(|t| !t.is_function_type());
        if lower.iter().any(Shape::is_function_type)
            && (has_other(&lower) || has_other(&exact) || has_other(&upper))
        {
            lower.retain(|t| !t.is_function_type());
        }
        lower.retain(|t| {
            t.as_function_type()
                .map_or(true, |sig| types.natural_delegate(sig).is_some())
        });

        let usable = |t: &Shape| !self.mentions_session_var(t) && !t.contains_error();
        lower.retain(usable);
        exact.retain(usable);
        upper.retain(usable);

        let mut candidates = Candidates::new(types.object_type());
        if let Some(shape) = &shape {
            candidates.insert(shape.clone());
        } else if exact.is_empty() {
            for bound in &lower {
                self.add_or_merge_candidate(&mut candidates, bound, Variance::Out);
            }
            for bound in &upper {
                self.add_or_merge_candidate(&mut candidates, bound, Variance::In);
            }
        } else {
            for bound in &exact {
                self.add_or_merge_candidate(&mut candidates, bound, Variance::Invariant);
            }
            if candidates.len() >= 2 {
                return Err(InferenceFailure::AmbiguousBounds { var });
            }
        }
        if candidates.len() == 0 {
            return Err(InferenceFailure::NoCandidate { var });
        }

        let initial = candidates.values();
        self.merge_or_remove_candidates(&mut candidates, &lower, &initial, Variance::Out, false);
        self.merge_or_remove_candidates(&mut candidates, &upper, &initial, Variance::In, false);
        if let Some(shape) = &shape {
            let current = candidates.values();
            self.merge_or_remove_candidates(
                &mut candidates,
                std::slice::from_ref(shape),
                &current,
                Variance::In,
                true,
            );
        }

        let remaining = candidates.values();
        if remaining.is_empty() {
            return Err(InferenceFailure::NoCandidate { var });
        }
        let best = self
            .unique_best(&remaining)
            .ok_or(InferenceFailure::AmbiguousBounds { var })?;

        match best.as_function_type() {
            Some(sig) => {
                let delegate = types
                    .natural_delegate(sig)
                    .ok_or(InferenceFailure::NoCandidate { var })?;
                let delegate = if types.has_expression_tree_constraint(var) {
                    types.expression_tree_of(&delegate).unwrap_or(delegate)
                } else {
                    delegate
                };
                Ok(Fixed {
                    ty: delegate.with_nullability(best.nullability()),
                    from_function_type: true,
                })
            }
            None => Ok(Fixed {
                ty: best,
                from_function_type: false,
            }),
        }
    }

    /// Implicit conversion as fixing sees it: `dynamic` converts to nothing
    /// but `dynamic`.
    fn fix_converts(&self, from: &Shape, to: &Shape, with_nullability: bool) -> bool {
        if from.is_dynamic() && !to.is_dynamic() {
            return false;
        }
        self.env
            .conversions
            .implicit_conversion_exists(from, to, with_nullability)
    }

    fn add_or_merge_candidate(&self, candidates: &mut Candidates, bound: &Shape, variance: Variance) {
        let candidate = if self.env.include_nullability {
            bound.clone()
        } else {
            bound.erase_nullability()
        };
        if candidates.position(&candidate).is_some() {
            merge_and_replace(candidates, &candidate, &candidate, variance);
        } else {
            candidates.insert(candidate);
        }
    }

    /// Drop candidates that some bound rules out. Lower bounds (`Out`) must
    /// convert to the candidate, upper bounds (`In`) must accept it.
    fn merge_or_remove_candidates(
        &self,
        candidates: &mut Candidates,
        bounds: &[Shape],
        initial: &[Shape],
        variance: Variance,
        with_nullability: bool,
    ) {
        let include_nullability = self.env.include_nullability;
        for bound in bounds {
            for candidate in initial {
                let same = if include_nullability {
                    bound == candidate
                } else {
                    bound.eq_ignoring_nullability(candidate)
                };
                if same {
                    continue;
                }

                let (from, to) = match variance {
                    Variance::Out => (bound, candidate),
                    _ => (candidate, bound),
                };
                if !self.fix_converts(from, to, with_nullability) {
                    candidates.remove(candidate);
                    if include_nullability {
                        if let Some(old) = candidates.get(bound).cloned() {
                            let merged = old.nullability().merge(candidate.nullability(), variance);
                            if merged != old.nullability() {
                                candidates.replace(bound, old.with_nullability(merged));
                            }
                        }
                    }
                } else if candidates.same_key(bound, candidate) {
                    merge_and_replace(candidates, candidate, bound, variance);
                }
            }
        }
    }

    /// The one candidate every other candidate converts to.
    fn unique_best(&self, candidates: &[Shape]) -> Option<Shape> {
        let mut best: Option<&Shape> = None;
        for candidate in candidates {
            let dominates = candidates
                .iter()
                .all(|other| other == candidate || self.fix_converts(other, candidate, false));
            if !dominates {
                continue;
            }
            if best.is_some() {
                return None;
            }
            best = Some(candidate);
        }
        best.cloned()
    }

    /// Variables ready to be fixed this round.
    pub(crate) fn fixable(&mut self, dependent: bool) -> Vec<usize> {
        (0..self.var_count())
            .filter(|&idx| {
                self.bounds.is_unfixed(idx)
                    && self.has_usable_bound(idx)
                    && if dependent {
                        self.is_fixable_dependent(idx)
                    } else {
                        self.is_fixable_nondependent(idx)
                    }
            })
            .collect()
    }

    fn has_usable_bound(&self, idx: usize) -> bool {
        self.bounds
            .has_bound(idx, |bound| self.mentions_session_var(bound))
    }

    fn is_fixable_nondependent(&mut self, idx: usize) -> bool {
        !self.deps.function.depends_on_any(idx)
            && !self.deps.shape.depends_on_any(idx)
            && !self.deps.bound.depends_on_any(idx)
    }

    /// Depends on something, but something else is waiting on it, and its
    /// shape is complete.
    fn is_fixable_dependent(&mut self, idx: usize) -> bool {
        !self.deps.shape.depends_on_any(idx)
            && (self.deps.shape.any_depends_on(idx)
                || self.deps.function.any_depends_on(idx)
                || self.deps.bound.any_depends_on(idx))
    }
}

/// Merge `new` into the candidate stored under `key`'s key. A `dynamic` bound
/// never replaces what is there.
fn merge_and_replace(candidates: &mut Candidates, key: &Shape, new: &Shape, variance: Variance) {
    if new.is_dynamic() {
        return;
    }
    if let Some(latest) = candidates.get(key).cloned() {
        candidates.replace(key, merge_equivalent(&latest, new, variance));
    }
}

// ==========================================================================
// Bound propagation
// ==========================================================================
//
// Every bound enters through add_bound_and_infer. A bound that mentions
// other session variables is combined with the variable's earlier bounds
// (and its shape) so information flows between variables without walking
// the argument list again. Recursion ends because duplicate bounds are
// dropped on insertion and every (kind, source, target) pair is inferred at
// most once per session.

use shape::Shape;

use crate::{deps::DepKind, BoundKind, Inferrer};

impl Inferrer<'_> {
    pub(crate) fn add_bound_and_infer(&mut self, bound: Shape, idx: usize, kind: BoundKind) {
        debug_assert!(self.bounds.is_unfixed(idx));

        if kind == BoundKind::Shape {
            self.bounds.set_shape(idx, bound.clone());
        } else if !self.bounds.add(idx, kind, bound.clone()) {
            return;
        }
        log::trace!(
            "{:?}: {kind:?} {}",
            self.vars[idx],
            self.type_name(&bound)
        );

        // Shapes combine with exact bounds as exact bounds.
        let as_bound = if kind == BoundKind::Shape {
            BoundKind::Exact
        } else {
            kind
        };

        if self.mentions_session_var(&bound) {
            let graph = if kind == BoundKind::Shape {
                DepKind::Shape
            } else {
                DepKind::Bound
            };
            for j in 0..self.var_count() {
                if bound.contains_var(self.vars[j]) {
                    self.deps.graph(graph).set_direct(idx, j);
                }
            }

            // Earlier bounds of the same variable say something about the
            // variables inside the new one.
            for existing in self.bounds.get(idx, BoundKind::Exact).to_vec() {
                if existing != bound {
                    self.infer_bounds(as_bound, &existing, &bound);
                }
            }
            for existing in self.bounds.get(idx, BoundKind::LowerBound).to_vec() {
                if existing != bound {
                    self.infer_bounds(BoundKind::LowerBound, &existing, &bound);
                }
            }
            for existing in self.bounds.get(idx, BoundKind::UpperBound).to_vec() {
                if existing != bound {
                    self.infer_bounds(BoundKind::UpperBound, &existing, &bound);
                }
            }
            if kind != BoundKind::Shape && self.deps.shape.depends_on_any(idx) {
                if let Some(shape) = self.bounds.shape(idx).cloned() {
                    self.infer_bounds(kind, &shape, &bound);
                }
            }
        }

        // The new bound says something about the variables inside the
        // earlier ones.
        if self.deps.bound.depends_on_any(idx) {
            let recorded = [
                (BoundKind::Exact, as_bound),
                (BoundKind::LowerBound, BoundKind::UpperBound),
                (BoundKind::UpperBound, BoundKind::LowerBound),
            ];
            for (set, inferred) in recorded {
                for existing in self.bounds.get(idx, set).to_vec() {
                    if existing != bound && self.mentions_session_var(&existing) {
                        self.infer_bounds(inferred, &bound, &existing);
                    }
                }
            }
        }

        if kind != BoundKind::Shape && self.deps.shape.depends_on_any(idx) {
            if let Some(shape) = self.bounds.shape(idx).cloned() {
                self.infer_bounds(kind, &bound, &shape);
            }
        }
    }

    /// Substitute a freshly fixed variable into every bound and shape that
    /// mentions it directly, then cut it out of the graphs.
    pub(crate) fn update_bounds_after_fix(&mut self, idx: usize) {
        for i in 0..self.var_count() {
            if self.deps.bound.is_direct(i, idx) {
                self.bounds.substitute_bounds(i, &self.subst);
                self.deps.bound.forget_direct(i, idx);
            }
            if self.deps.shape.is_direct(i, idx) {
                self.bounds.substitute_shape(i, &self.subst);
                self.deps.shape.forget_direct(i, idx);
            }
        }
        self.deps.function.clear_var(idx);
        self.deps.bound.clear_var(idx);
    }
}

use call_site::Arg;
use shape::{Nullability, Shape, Ty};

use crate::{BoundKind, InferenceFailure, Inferrer, TypeInferenceResult};

/// Outcome of one phase-two round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    AllFixed,
    MadeProgress,
    Failed,
}

impl Inferrer<'_> {
    pub(crate) fn infer(&mut self) -> TypeInferenceResult {
        let success = if self.triples.is_empty() {
            log::debug!("nothing to infer from");
            false
        } else {
            self.first_phase();
            self.second_phase()
        };

        let (type_args, inferred_vars) = self.results();
        TypeInferenceResult {
            success,
            type_args,
            inferred_vars,
            from_function_type: self.from_function_type(),
            failures: self.failures.clone(),
        }
    }

    /// Run both phases over the first argument alone and check that
    /// `first_param` came out fully resolved.
    pub(crate) fn infer_from_first_argument(&mut self, first_param: &Shape) -> bool {
        let all_typed = self.triples.iter().all(|t| {
            t.source
                .natural_type()
                .is_some_and(|ty| self.is_really_a_type(&ty))
        });
        if !all_typed {
            log::debug!("first argument probe needs typed inputs");
            return false;
        }

        self.first_phase();
        // Variables the first parameter does not mention may stay unfixed.
        self.second_phase();
        let resolved = first_param.substitute(&self.subst);
        !self.mentions_session_var(&resolved)
    }

    fn first_phase(&mut self) {
        let triples = self.triples.clone();
        for triple in triples.iter() {
            match (&triple.source, triple.kind) {
                (Arg::Typed(pattern), BoundKind::Shape) => {
                    let Some(idx) = self.unfixed_index(&triple.target) else {
                        continue;
                    };
                    self.add_bound_and_infer(pattern.clone(), idx, BoundKind::Shape);
                }
                (source, kind) => self.explicit_inference(source, &triple.target, kind),
            }
        }
    }

    fn second_phase(&mut self) -> bool {
        self.deps.function = self.function_dependencies();
        let mut round = 0;
        loop {
            round += 1;
            match self.second_phase_round() {
                Round::AllFixed => {
                    log::debug!("all variables fixed after {} rounds", round - 1);
                    return true;
                }
                Round::MadeProgress => log::debug!("round {round} made progress"),
                Round::Failed => {
                    log::debug!("round {round} failed");
                    return false;
                }
            }
        }
    }

    fn second_phase_round(&mut self) -> Round {
        if (0..self.var_count()).all(|idx| !self.bounds.is_unfixed(idx)) {
            return Round::AllFixed;
        }

        self.output_inferences();

        let mut ready = self.fixable(false);
        if ready.is_empty() {
            ready = self.fixable(true);
        }
        if ready.is_empty() {
            let unfixed = (0..self.var_count())
                .filter(|idx| self.bounds.is_unfixed(*idx))
                .map(|idx| self.vars[idx])
                .collect();
            self.failures
                .push(InferenceFailure::CyclicUnresolvable { unfixed });
            return Round::Failed;
        }

        // Every ready variable is fixed even if an earlier one fails.
        let mut fixed_all = true;
        for idx in ready {
            fixed_all &= self.fix(idx);
        }
        if fixed_all {
            Round::MadeProgress
        } else {
            Round::Failed
        }
    }

    /// What each variable resolved to, type parameters first, then
    /// placeholders.
    pub(crate) fn results(&self) -> (Vec<Option<Shape>>, Vec<Option<Shape>>) {
        let mut results: Vec<Option<Shape>> =
            (0..self.var_count()).map(|idx| self.result_of(idx)).collect();
        let inferred_vars = results.split_off(self.type_param_count);
        (results, inferred_vars)
    }

    fn result_of(&self, idx: usize) -> Option<Shape> {
        let fixed = self.bounds.fixed(idx)?;
        match fixed.ty.ty() {
            Ty::Error(None) => None,
            Ty::Error(Some(_)) => Some(fixed.ty.clone()),
            // `int?` is a different type, not an annotated `int`.
            _ if self.env.include_nullability
                && self.bounds.var(idx).nullable_lower == Nullability::Annotated
                && !fixed.ty.is_value_type() =>
            {
                Some(fixed.ty.annotated())
            }
            _ => Some(fixed.ty.clone()),
        }
    }

    fn from_function_type(&self) -> bool {
        (0..self.var_count()).any(|idx| {
            self.result_of(idx).is_some()
                && self
                    .bounds
                    .fixed(idx)
                    .is_some_and(|fixed| fixed.from_function_type)
        })
    }
}

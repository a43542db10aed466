mod bounds;
mod constrain;
mod deps;
mod fix;
mod infer;
mod output;
mod propagate;

#[cfg(test)]
mod tests;

#[cfg(test)]
mod pbt;

use std::sync::Arc;

use bounds::BoundStore;
use call_site::{Arg, CollectionElement, MethodGroupResolver};
use deps::Dependencies;
use derive_more::Debug;
use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use shape::{Conversions, RefKind, Shape, Substitution, TyVar, TypeStructure};
use thiserror::Error;

pub use bounds::BoundKind;

/// Everything an inference session needs from the rest of the compiler.
#[derive(Debug, Clone, Copy)]
pub struct InferEnv<'a> {
    #[debug(skip)]
    pub types: &'a dyn TypeStructure,
    #[debug(skip)]
    pub conversions: &'a dyn Conversions,
    #[debug(skip)]
    pub methods: &'a dyn MethodGroupResolver,
    /// Nullable annotations take part in fixing (a nullable-enabled context).
    pub include_nullability: bool,
}

#[derive(Debug, Clone)]
#[debug("{ref_kind:?} {ty:?}")]
pub struct FormalParam {
    pub ty: Shape,
    pub ref_kind: RefKind,
}

/// `C1<int> x = new C2<_>()`: the declared type on the left constrains the
/// constructed type on the right.
#[derive(Debug, Clone)]
pub struct TargetConstraint {
    pub source: Shape,
    /// The constructed type, written in terms of the type parameters.
    pub constructed: Shape,
    pub by_ref: bool,
}

/// One generic call (or object creation) to infer type arguments for.
#[derive(Debug, Clone, Default)]
pub struct CallSite {
    pub type_params: Vec<TyVar>,
    /// The `_`s of `type_args`, in order of appearance.
    pub placeholders: Vec<TyVar>,
    pub params: Vec<FormalParam>,
    pub args: Vec<Arg>,
    /// Explicit type-argument pattern, e.g. `<_, string>`. Empty if none.
    pub type_args: Vec<Shape>,
    pub target: Option<TargetConstraint>,
    /// Declared constraints per type parameter. Empty if none.
    pub constraints: Vec<Vec<Shape>>,
    /// Outer type parameters already bound by the containing type.
    pub containing: Substitution,
}

impl CallSite {
    pub fn new(type_params: impl IntoIterator<Item = TyVar>) -> Self {
        CallSite {
            type_params: type_params.into_iter().collect(),
            ..CallSite::default()
        }
    }

    pub fn param(self, ty: Shape) -> Self {
        self.ref_param(ty, RefKind::None)
    }

    pub fn ref_param(mut self, ty: Shape, ref_kind: RefKind) -> Self {
        self.params.push(FormalParam { ty, ref_kind });
        self
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn type_args(
        mut self,
        type_args: impl IntoIterator<Item = Shape>,
        placeholders: impl IntoIterator<Item = TyVar>,
    ) -> Self {
        self.type_args = type_args.into_iter().collect();
        self.placeholders = placeholders.into_iter().collect();
        self
    }

    pub fn target(mut self, source: Shape, constructed: Shape, by_ref: bool) -> Self {
        self.target = Some(TargetConstraint {
            source,
            constructed,
            by_ref,
        });
        self
    }

    pub fn constraints(mut self, constraints: Vec<Vec<Shape>>) -> Self {
        self.constraints = constraints;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInferenceResult {
    pub success: bool,
    /// One entry per type parameter; `None` where nothing was inferred.
    pub type_args: Vec<Option<Shape>>,
    /// One entry per placeholder.
    pub inferred_vars: Vec<Option<Shape>>,
    /// Some variable was fixed to the delegate of a lambda's natural type.
    pub from_function_type: bool,
    pub failures: Vec<InferenceFailure>,
}

/// Why a session did not infer every variable. These are ordinary outcomes,
/// reported in the result rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceFailure {
    #[error("the bounds of {var:?} admit more than one candidate")]
    AmbiguousBounds { var: TyVar },

    #[error("no candidate satisfies the bounds of {var:?}")]
    NoCandidate { var: TyVar },

    #[error("no variable could be fixed; still unfixed: {unfixed:?}")]
    CyclicUnresolvable { unfixed: Vec<TyVar> },
}

/// The caller handed the engine something it cannot take.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum ContractViolation {
    #[error("placeholder {var:?} does not belong to this call site")]
    #[diagnostic(code(infer::foreign_placeholder))]
    ForeignPlaceholder { var: TyVar },

    #[error("{var:?} is listed twice among the inferred variables")]
    #[diagnostic(code(infer::duplicate_variable))]
    DuplicateVariable { var: TyVar },

    #[error("expected {expected} explicit type arguments, found {found}")]
    #[diagnostic(code(infer::type_argument_count))]
    TypeArgumentCount { expected: usize, found: usize },

    #[error("expected {expected} constraint lists, found {found}")]
    #[diagnostic(code(infer::constraint_count))]
    ConstraintCount { expected: usize, found: usize },

    #[error("only object creation can carry a target-typed constraint")]
    #[diagnostic(
        code(infer::target_on_method),
        help("use `infer_constructor` for `new C<_>()` forms")
    )]
    TargetOnMethodCall,
}

// ==========================================================================
// Entry points
// ==========================================================================

/// Infer the type arguments of a generic method call.
pub fn infer_method(
    env: InferEnv<'_>,
    site: &CallSite,
) -> Result<TypeInferenceResult, ContractViolation> {
    if site.target.is_some() {
        return Err(ContractViolation::TargetOnMethodCall);
    }
    let mut inferrer = Inferrer::new(env, site, Mode::Method)?;
    Ok(inferrer.infer())
}

/// Infer the type arguments of an object creation with a partial type
/// argument list, honoring the target type when one is given.
pub fn infer_constructor(
    env: InferEnv<'_>,
    site: &CallSite,
) -> Result<TypeInferenceResult, ContractViolation> {
    let mut inferrer = Inferrer::new(env, site, Mode::Constructor)?;
    Ok(inferrer.infer())
}

/// Decide whether the first argument alone pins down the first parameter's
/// type (the extension-method receiver probe). On success the returned
/// session can report what it inferred.
pub fn can_infer_from_first_argument<'env>(
    env: InferEnv<'env>,
    site: &CallSite,
) -> Result<Option<FirstArgumentInference<'env>>, ContractViolation> {
    let mut inferrer = Inferrer::new(env, site, Mode::FirstArgument)?;
    let (Some(first), Some(_)) = (site.params.first(), site.args.first()) else {
        return Ok(None);
    };
    Ok(inferrer
        .infer_from_first_argument(&first.ty)
        .then_some(FirstArgumentInference { inferrer }))
}

/// The type arguments inferred from the first argument alone, or `None` when
/// the probe fails.
pub fn infer_type_arguments_from_first_argument(
    env: InferEnv<'_>,
    site: &CallSite,
) -> Result<Option<Vec<Option<Shape>>>, ContractViolation> {
    Ok(can_infer_from_first_argument(env, site)?.map(|probe| probe.type_args()))
}

/// A finished first-argument probe.
#[derive(Debug)]
pub struct FirstArgumentInference<'env> {
    inferrer: Inferrer<'env>,
}

impl FirstArgumentInference<'_> {
    pub fn type_args(&self) -> Vec<Option<Shape>> {
        self.inferrer.results().0
    }

    pub fn inferred_vars(&self) -> Vec<Option<Shape>> {
        self.inferrer.results().1
    }
}

// ==========================================================================
// Session state
// ==========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Method,
    Constructor,
    FirstArgument,
}

/// One `(source, target, kind)` input of phase one.
#[derive(Debug, Clone)]
#[debug("{source:?} -> {target:?} ({kind:?})")]
pub(crate) struct Triple {
    source: Arg,
    target: Shape,
    kind: BoundKind,
}

#[derive(Debug)]
pub(crate) struct Inferrer<'env> {
    env: InferEnv<'env>,
    /// Type parameters first, then placeholders.
    vars: Vec<TyVar>,
    type_param_count: usize,
    index: FxHashMap<TyVar, usize>,

    triples: Arc<[Triple]>,
    bounds: BoundStore,
    deps: Dependencies,

    /// Fixed variables (and the containing type's parameters) to their
    /// results.
    subst: Substitution,
    /// `(kind, source, target)` inferences already carried out.
    #[debug(skip)]
    seen: FxHashSet<(BoundKind, Shape, Shape)>,
    failures: Vec<InferenceFailure>,
}

impl<'env> Inferrer<'env> {
    fn new(env: InferEnv<'env>, site: &CallSite, mode: Mode) -> Result<Self, ContractViolation> {
        validate(env, site)?;

        let vars = site
            .type_params
            .iter()
            .chain(&site.placeholders)
            .copied()
            .collect::<Vec<_>>();
        let index = vars
            .iter()
            .enumerate()
            .map(|(idx, var)| (*var, idx))
            .collect();

        let triples = assemble_triples(site, mode);
        log::debug!(
            "new {mode:?} session over {} variables with {} inputs",
            vars.len(),
            triples.len()
        );

        Ok(Inferrer {
            env,
            type_param_count: site.type_params.len(),
            bounds: BoundStore::new(vars.len()),
            deps: Dependencies::new(vars.len()),
            vars,
            index,
            triples: triples.into(),
            subst: site.containing.clone(),
            seen: FxHashSet::default(),
            failures: Vec::new(),
        })
    }

    fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Index of `shape` if it is a session variable that is not fixed yet.
    /// The annotation of the occurrence does not matter.
    fn unfixed_index(&self, shape: &Shape) -> Option<usize> {
        let idx = *self.index.get(&shape.as_var()?)?;
        self.bounds.is_unfixed(idx).then_some(idx)
    }

    fn mentions_session_var(&self, shape: &Shape) -> bool {
        shape.any_var(|v| self.index.contains_key(&v))
    }

    fn mentions_unfixed_var(&self, shape: &Shape) -> bool {
        shape.any_var(|v| {
            self.index
                .get(&v)
                .is_some_and(|idx| self.bounds.is_unfixed(*idx))
        })
    }

    fn type_name(&self, shape: &Shape) -> String {
        self.env.types.type_name(shape)
    }
}

fn assemble_triples(site: &CallSite, mode: Mode) -> Vec<Triple> {
    let mut triples = Vec::new();

    let arg_count = match mode {
        Mode::FirstArgument => 1,
        Mode::Method | Mode::Constructor => usize::MAX,
    };
    for (param, arg) in site.params.iter().zip(&site.args).take(arg_count) {
        let kind = if param.ref_kind.is_by_ref() || arg.is_pointer() {
            BoundKind::Exact
        } else {
            BoundKind::LowerBound
        };
        triples.push(Triple {
            source: arg.clone(),
            target: param.ty.clone(),
            kind,
        });
    }

    for (var, type_arg) in site.type_params.iter().zip(&site.type_args) {
        triples.push(Triple {
            source: Arg::Typed(type_arg.clone()),
            target: Shape::var(*var),
            kind: BoundKind::Shape,
        });
    }

    if mode == Mode::FirstArgument {
        return triples;
    }

    if let Some(target) = &site.target {
        let kind = if target.by_ref || target.source.is_pointer() {
            BoundKind::Exact
        } else {
            BoundKind::UpperBound
        };
        triples.push(Triple {
            source: Arg::Typed(target.source.clone()),
            target: target.constructed.clone(),
            kind,
        });
    }

    for (var, constraints) in site.type_params.iter().zip(&site.constraints) {
        for constraint in constraints {
            triples.push(Triple {
                source: Arg::Typed(constraint.clone()),
                target: Shape::var(*var),
                kind: BoundKind::UpperBound,
            });
        }
    }
    triples
}

fn validate(env: InferEnv<'_>, site: &CallSite) -> Result<(), ContractViolation> {
    let mut seen = FxHashSet::default();
    for var in site.type_params.iter().chain(&site.placeholders) {
        if !seen.insert(*var) {
            return Err(ContractViolation::DuplicateVariable { var: *var });
        }
    }
    if !site.type_args.is_empty() && site.type_args.len() != site.type_params.len() {
        return Err(ContractViolation::TypeArgumentCount {
            expected: site.type_params.len(),
            found: site.type_args.len(),
        });
    }
    if !site.constraints.is_empty() && site.constraints.len() != site.type_params.len() {
        return Err(ContractViolation::ConstraintCount {
            expected: site.type_params.len(),
            found: site.constraints.len(),
        });
    }

    let placeholders: FxHashSet<TyVar> = site.placeholders.iter().copied().collect();
    let check = |shape: &Shape| -> Result<(), ContractViolation> {
        match shape
            .free_vars()
            .into_iter()
            .find(|v| env.types.is_placeholder(*v) && !placeholders.contains(v))
        {
            Some(var) => Err(ContractViolation::ForeignPlaceholder { var }),
            None => Ok(()),
        }
    };

    let mut shapes: Vec<&Shape> = Vec::new();
    shapes.extend(site.params.iter().map(|p| &p.ty));
    shapes.extend(&site.type_args);
    shapes.extend(site.constraints.iter().flatten());
    shapes.extend(site.containing.values());
    if let Some(target) = &site.target {
        shapes.push(&target.source);
        shapes.push(&target.constructed);
    }
    for arg in &site.args {
        arg_shapes(arg, &mut shapes);
    }
    shapes.into_iter().try_for_each(check)
}

fn arg_shapes<'a>(arg: &'a Arg, out: &mut Vec<&'a Shape>) {
    match arg {
        Arg::Typed(shape) => out.push(shape),
        Arg::Null => {}
        Arg::Lambda(lambda) => {
            out.extend(lambda.explicit_params().into_iter().flatten().map(|p| &p.ty));
            out.extend(&lambda.explicit_return);
        }
        Arg::MethodGroup(group) => {
            for sig in &group.candidates {
                out.extend(sig.param_types());
                out.push(&sig.ret);
            }
        }
        Arg::Tuple(elems) => elems.iter().for_each(|e| arg_shapes(e, out)),
        Arg::Collection(elems) => {
            for elem in elems {
                match elem {
                    CollectionElement::Expr(e) => arg_shapes(e, out),
                    CollectionElement::Spread(ty) => out.extend(ty),
                }
            }
        }
    }
}

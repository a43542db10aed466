mod resolver;

use std::sync::Arc;

pub use resolver::{ApplicableMethodResolver, MethodGroupResolver};

use derive_more::{Debug, From};
use shape::{Nullability, Shape, SigParam, Signature};
use smol_str::SmolStr;

/// Computes a lambda body's return type once its parameter types are known.
/// `None` means the body could not be typed with those parameters.
pub type ReturnInference = Arc<dyn Fn(&[Shape]) -> Option<Shape> + Send + Sync>;

/// An argument expression at a generic call site.
///
/// This is a closed set: inference dispatches on the variant and never asks
/// for anything a variant does not carry.
#[derive(Debug, Clone, From)]
pub enum Arg {
    /// Any expression with a type of its own.
    #[debug("{_0:?}")]
    Typed(Shape),

    /// `null` or `default` without a target type.
    #[from(ignore)]
    #[debug("null")]
    Null,

    #[debug("{_0:?}")]
    Lambda(Lambda),

    #[debug("{_0:?}")]
    MethodGroup(MethodGroup),

    #[from(ignore)]
    #[debug("Tuple{_0:?}")]
    Tuple(Vec<Arg>),

    #[from(ignore)]
    #[debug("Collection{_0:?}")]
    Collection(Vec<CollectionElement>),
}

impl Arg {
    /// The type used when the argument takes part in ordinary (typed)
    /// inference.
    pub fn natural_type(&self) -> Option<Shape> {
        match self {
            Arg::Typed(shape) => Some(shape.clone()),
            Arg::Null | Arg::Collection(_) => None,
            Arg::Lambda(lambda) => lambda.function_type(),
            Arg::MethodGroup(group) => group.function_type(),
            Arg::Tuple(elems) => elems
                .iter()
                .map(Arg::natural_type)
                .collect::<Option<Vec<_>>>()
                .map(Shape::tuple),
        }
    }

    /// Annotation an untyped argument contributes to a variable it flows into.
    pub fn nullability_hint(&self) -> Nullability {
        match self {
            Arg::Null => Nullability::Annotated,
            Arg::Typed(shape) => shape.nullability(),
            _ => Nullability::Oblivious,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Arg::Typed(shape) if shape.is_pointer())
    }
}

#[derive(Debug, Clone)]
pub enum LambdaParams {
    /// `(a, b) => ...`
    Implicit(usize),
    /// `(int a, string b) => ...`
    Explicit(Vec<SigParam>),
}

#[derive(Debug, Clone)]
#[debug("Lambda({params:?} -> {explicit_return:?})")]
pub struct Lambda {
    pub params: LambdaParams,
    pub explicit_return: Option<Shape>,
    pub body: ReturnInference,
}

impl Lambda {
    pub fn implicit(
        arity: usize,
        body: impl Fn(&[Shape]) -> Option<Shape> + Send + Sync + 'static,
    ) -> Self {
        Lambda {
            params: LambdaParams::Implicit(arity),
            explicit_return: None,
            body: Arc::new(body),
        }
    }

    pub fn explicit(
        params: impl IntoIterator<Item = Shape>,
        body: impl Fn(&[Shape]) -> Option<Shape> + Send + Sync + 'static,
    ) -> Self {
        Lambda {
            params: LambdaParams::Explicit(params.into_iter().map(SigParam::from).collect()),
            explicit_return: None,
            body: Arc::new(body),
        }
    }

    pub fn returning(mut self, ret: Shape) -> Self {
        self.explicit_return = Some(ret);
        self
    }

    pub fn arity(&self) -> usize {
        match &self.params {
            LambdaParams::Implicit(arity) => *arity,
            LambdaParams::Explicit(params) => params.len(),
        }
    }

    pub fn explicit_params(&self) -> Option<&[SigParam]> {
        match &self.params {
            LambdaParams::Implicit(_) => None,
            LambdaParams::Explicit(params) => Some(params),
        }
    }

    /// Return type of the body when its parameters have `params`. An explicit
    /// return type wins.
    pub fn infer_return(&self, params: &[Shape]) -> Option<Shape> {
        self.explicit_return
            .clone()
            .or_else(|| (self.body)(params))
    }

    /// The natural function type; only explicitly typed lambdas have one.
    pub fn function_type(&self) -> Option<Shape> {
        let params = self.explicit_params()?;
        let types: Vec<Shape> = params.iter().map(|p| p.ty.clone()).collect();
        let ret = self.infer_return(&types)?;
        Some(Shape::function(Signature {
            params: params.to_vec(),
            ..Signature::new([], ret)
        }))
    }
}

#[derive(Debug, Clone)]
#[debug("MethodGroup({name}, address_of: {address_of})")]
pub struct MethodGroup {
    pub name: SmolStr,
    pub candidates: Vec<Signature>,
    /// `&M`, only usable as a function pointer.
    pub address_of: bool,
}

impl MethodGroup {
    pub fn new(name: &str, candidates: impl IntoIterator<Item = Signature>) -> Self {
        MethodGroup {
            name: name.into(),
            candidates: candidates.into_iter().collect(),
            address_of: false,
        }
    }

    pub fn address_of(mut self) -> Self {
        self.address_of = true;
        self
    }

    /// A single-candidate group has the candidate's signature as its natural
    /// function type.
    pub fn function_type(&self) -> Option<Shape> {
        match self.candidates.as_slice() {
            [only] if !self.address_of => Some(Shape::function(only.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CollectionElement {
    #[debug("{_0:?}")]
    Expr(Arg),
    /// `..xs`; the element type of `xs` when it has one.
    #[debug("..{_0:?}")]
    Spread(Option<Shape>),
}

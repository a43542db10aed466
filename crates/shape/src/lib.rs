mod conversions;
mod decompose;
mod defs;
mod display;
mod merge;
mod nullability;
mod structure;
mod walk;

#[cfg(any(test, feature = "proptest_support"))]
pub mod arbitrary;


use std::sync::Arc;

pub use conversions::{Conversions, StandardConversions};
pub use decompose::{
    array_elements, constructed_args, pointer_targets, signature_pairs, tuple_elements,
    SignaturePairs,
};
pub use defs::{DefTable, TyVarData, TypeDef, VarKind, WellKnown};
pub use display::ShapeDisplay;
pub use merge::merge_equivalent;
pub use nullability::Nullability;
pub use structure::TypeStructure;
pub use walk::Substitution;

use derive_more::Debug;
use la_arena::Idx;

/// A type variable: either a declared type parameter or a `_` placeholder
/// written in an explicit type-argument list.
pub type TyVar = Idx<TyVarData>;

/// A generic (or non generic) type definition.
pub type DefId = Idx<TypeDef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variance {
    #[default]
    Invariant,
    Out,
    In,
}

impl Variance {
    /// The variance of a position with declared variance `inner` nested in a
    /// position of variance `self`.
    pub fn compose(self, inner: Variance) -> Variance {
        match (self, inner) {
            (Variance::Invariant, _) | (_, Variance::Invariant) => Variance::Invariant,
            (Variance::Out, v) => v,
            (Variance::In, v) => v.flip(),
        }
    }

    pub fn flip(self) -> Variance {
        match self {
            Variance::Invariant => Variance::Invariant,
            Variance::Out => Variance::In,
            Variance::In => Variance::Out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RefKind {
    #[default]
    None,
    Ref,
    Out,
    In,
}

impl RefKind {
    pub fn is_by_ref(self) -> bool {
        !matches!(self, RefKind::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallConv {
    #[default]
    Managed,
    Cdecl,
    StdCall,
    ThisCall,
    FastCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Class,
    Struct,
    Interface,
    Delegate,
    Enum,
}

impl DefKind {
    pub fn is_value_type(self) -> bool {
        matches!(self, DefKind::Struct | DefKind::Enum)
    }
}

/// A use of a type definition with its arguments.
///
/// The definition kind and the declared variance of each position travel with
/// the node so structural code never needs to go back to the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{def:?}{args:?}")]
pub struct NamedTy {
    pub def: DefId,
    pub kind: DefKind,
    pub args: Vec<Shape>,
    pub variance: Arc<[Variance]>,
}

impl NamedTy {
    pub fn variance_at(&self, idx: usize) -> Variance {
        self.variance.get(idx).copied().unwrap_or_default()
    }

    pub fn is_interface_or_delegate(&self) -> bool {
        matches!(self.kind, DefKind::Interface | DefKind::Delegate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{ref_kind:?} {ty:?}")]
pub struct SigParam {
    pub ty: Shape,
    pub ref_kind: RefKind,
}

impl From<Shape> for SigParam {
    fn from(ty: Shape) -> Self {
        SigParam {
            ty,
            ref_kind: RefKind::None,
        }
    }
}

/// Parameter list, return and calling convention shared by delegates,
/// function pointers and natural function types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("({params:?}) -> {ret:?}")]
pub struct Signature {
    pub params: Vec<SigParam>,
    pub ret: Shape,
    pub ret_ref: RefKind,
    pub conv: CallConv,
}

impl Signature {
    pub fn new(params: impl IntoIterator<Item = Shape>, ret: Shape) -> Self {
        Signature {
            params: params.into_iter().map(SigParam::from).collect(),
            ret,
            ret_ref: RefKind::None,
            conv: CallConv::Managed,
        }
    }

    pub fn with_conv(mut self, conv: CallConv) -> Self {
        self.conv = conv;
        self
    }

    pub fn param_types(&self) -> impl Iterator<Item = &Shape> {
        self.params.iter().map(|p| &p.ty)
    }

    pub fn map(&self, mut f: impl FnMut(&Shape) -> Shape) -> Signature {
        Signature {
            params: self
                .params
                .iter()
                .map(|p| SigParam {
                    ty: f(&p.ty),
                    ref_kind: p.ref_kind,
                })
                .collect(),
            ret: f(&self.ret),
            ret_ref: self.ret_ref,
            conv: self.conv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    #[debug("Var({_0:?})")]
    Var(TyVar),

    #[debug("{_0:?}")]
    Named(NamedTy),

    #[debug("Array({elem:?}, {rank})")]
    Array { elem: Shape, rank: u32 },

    #[debug("Tuple{_0:?}")]
    Tuple(Vec<Shape>),

    #[debug("Ptr({_0:?})")]
    Pointer(Shape),

    #[debug("FnPtr{_0:?}")]
    FnPtr(Signature),

    /// The natural type of a lambda or method group before it is turned into
    /// a delegate.
    #[debug("Fn{_0:?}")]
    Function(Signature),

    #[debug("Dynamic")]
    Dynamic,

    #[debug("Error({_0:?})")]
    Error(Option<smol_str::SmolStr>),
}

/// A type tree plus the nullable annotation of its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[debug("{ty:?}{}", nullability.suffix())]
pub struct Shape {
    ty: Arc<Ty>,
    nullability: Nullability,
}

impl From<Ty> for Shape {
    fn from(ty: Ty) -> Self {
        Shape::new(ty)
    }
}

impl Shape {
    pub fn new(ty: Ty) -> Self {
        Shape {
            ty: Arc::new(ty),
            nullability: Nullability::NotAnnotated,
        }
    }

    pub fn var(var: TyVar) -> Self {
        Ty::Var(var).into()
    }

    pub fn array(elem: Shape) -> Self {
        Ty::Array { elem, rank: 1 }.into()
    }

    pub fn array_of_rank(elem: Shape, rank: u32) -> Self {
        Ty::Array { elem, rank }.into()
    }

    pub fn tuple(elems: impl IntoIterator<Item = Shape>) -> Self {
        Ty::Tuple(elems.into_iter().collect()).into()
    }

    pub fn pointer(pointee: Shape) -> Self {
        Ty::Pointer(pointee).into()
    }

    pub fn fn_ptr(sig: Signature) -> Self {
        Ty::FnPtr(sig).into()
    }

    pub fn function(sig: Signature) -> Self {
        Ty::Function(sig).into()
    }

    pub fn dynamic() -> Self {
        Ty::Dynamic.into()
    }

    pub fn error() -> Self {
        Ty::Error(None).into()
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn nullability(&self) -> Nullability {
        self.nullability
    }

    pub fn with_nullability(&self, nullability: Nullability) -> Shape {
        Shape {
            ty: self.ty.clone(),
            nullability,
        }
    }

    pub fn annotated(&self) -> Shape {
        self.with_nullability(Nullability::Annotated)
    }

    pub fn not_annotated(&self) -> Shape {
        self.with_nullability(Nullability::NotAnnotated)
    }

    pub fn is_annotated(&self) -> bool {
        self.nullability == Nullability::Annotated
    }

    pub fn as_var(&self) -> Option<TyVar> {
        match *self.ty {
            Ty::Var(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&NamedTy> {
        match &*self.ty {
            Ty::Named(named) => Some(named),
            _ => None,
        }
    }

    pub fn as_function_type(&self) -> Option<&Signature> {
        match &*self.ty {
            Ty::Function(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn is_function_type(&self) -> bool {
        matches!(*self.ty, Ty::Function(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(*self.ty, Ty::Dynamic)
    }

    pub fn is_error(&self) -> bool {
        matches!(*self.ty, Ty::Error(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(*self.ty, Ty::Pointer(_))
    }

    pub fn is_fn_ptr(&self) -> bool {
        matches!(*self.ty, Ty::FnPtr(_))
    }

    /// Structs, enums and tuples. Type variables are never value types here;
    /// their constraints are only known to the table.
    pub fn is_value_type(&self) -> bool {
        match &*self.ty {
            Ty::Named(named) => named.kind.is_value_type(),
            Ty::Tuple(_) => true,
            _ => false,
        }
    }
}

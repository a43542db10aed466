use crate::{Shape, Signature, TyVar};

/// Read-only view of the declarations behind shapes.
///
/// The inference engine only ever asks these questions; it never walks a
/// definition table directly.
pub trait TypeStructure {
    /// Direct base class. For a type parameter this is its effective base
    /// class (first class constraint, else `object`).
    fn base_type(&self, ty: &Shape) -> Option<Shape>;

    /// Every interface implemented by `ty`, including those inherited through
    /// the base chain and base interfaces, with arguments substituted.
    fn all_interfaces(&self, ty: &Shape) -> Vec<Shape>;

    fn is_reference_type(&self, ty: &Shape) -> bool;

    /// Invoke signature of a delegate, looking through `Expression<D>`.
    fn delegate_signature(&self, ty: &Shape) -> Option<Signature>;

    /// `T` for `Nullable<T>`.
    fn nullable_underlying(&self, ty: &Shape) -> Option<Shape>;

    /// Element type of a collection-expression target.
    fn iteration_element_type(&self, ty: &Shape) -> Option<Shape>;

    /// One of the generic collection interfaces a single dimension array
    /// implements.
    fn is_array_generic_interface(&self, ty: &Shape) -> bool;

    /// The delegate a function type turns into once it is fixed.
    fn natural_delegate(&self, sig: &Signature) -> Option<Shape>;

    fn expression_tree_of(&self, delegate: &Shape) -> Option<Shape>;

    /// True if `var` is constrained to an expression tree type.
    fn has_expression_tree_constraint(&self, var: TyVar) -> bool;

    /// True for `_` variables of an explicit type-argument list.
    fn is_placeholder(&self, var: TyVar) -> bool;

    fn is_void(&self, ty: &Shape) -> bool;

    fn object_type(&self) -> Shape;

    fn type_name(&self, ty: &Shape) -> String;
}

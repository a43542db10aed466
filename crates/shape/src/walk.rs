// ==========================================================================
// Shape traversal
// ==========================================================================
//
// Occurs checks, free variables and substitution. All of these are pure and
// return new trees; shared subtrees that are untouched keep their `Arc`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{NamedTy, Nullability, Shape, Ty, TyVar};

/// Replacement shapes for type variables.
pub type Substitution = FxHashMap<TyVar, Shape>;

impl Ty {
    /// Direct child shapes in a stable left to right order.
    pub fn children(&self) -> Vec<&Shape> {
        match self {
            Ty::Var(_) | Ty::Dynamic | Ty::Error(_) => Vec::new(),
            Ty::Named(named) => named.args.iter().collect(),
            Ty::Array { elem, .. } | Ty::Pointer(elem) => vec![elem],
            Ty::Tuple(elems) => elems.iter().collect(),
            Ty::FnPtr(sig) | Ty::Function(sig) => {
                sig.param_types().chain(std::iter::once(&sig.ret)).collect()
            }
        }
    }

    /// Rebuild this node with every child passed through `f`.
    pub fn map_children(&self, mut f: impl FnMut(&Shape) -> Shape) -> Ty {
        match self {
            Ty::Var(_) | Ty::Dynamic | Ty::Error(_) => self.clone(),
            Ty::Named(named) => Ty::Named(NamedTy {
                def: named.def,
                kind: named.kind,
                args: named.args.iter().map(f).collect(),
                variance: named.variance.clone(),
            }),
            Ty::Array { elem, rank } => Ty::Array {
                elem: f(elem),
                rank: *rank,
            },
            Ty::Pointer(pointee) => Ty::Pointer(f(pointee)),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(f).collect()),
            Ty::FnPtr(sig) => Ty::FnPtr(sig.map(f)),
            Ty::Function(sig) => Ty::Function(sig.map(f)),
        }
    }
}

impl Shape {
    /// True if any node of the tree satisfies `pred`.
    pub fn any_node(&self, pred: &mut impl FnMut(&Shape) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.ty().children().into_iter().any(|child| child.any_node(pred))
    }

    pub fn any_var(&self, mut pred: impl FnMut(TyVar) -> bool) -> bool {
        self.any_node(&mut |node| node.as_var().is_some_and(&mut pred))
    }

    pub fn contains_var(&self, var: TyVar) -> bool {
        self.any_var(|v| v == var)
    }

    pub fn contains_error(&self) -> bool {
        self.any_node(&mut |node| node.is_error())
    }

    /// Free variables in first occurrence order.
    pub fn free_vars(&self) -> Vec<TyVar> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        self.collect_vars(&mut seen, &mut out);
        out
    }

    fn collect_vars(&self, seen: &mut FxHashSet<TyVar>, out: &mut Vec<TyVar>) {
        if let Some(var) = self.as_var() {
            if seen.insert(var) {
                out.push(var);
            }
            return;
        }
        for child in self.ty().children() {
            child.collect_vars(seen, out);
        }
    }

    /// Replace variables found in `subst`.
    ///
    /// An annotated occurrence (`T?`) stays annotated unless the replacement
    /// is a value type.
    pub fn substitute(&self, subst: &Substitution) -> Shape {
        if subst.is_empty() {
            return self.clone();
        }
        if let Some(var) = self.as_var() {
            return match subst.get(&var) {
                Some(replacement) if self.is_annotated() && !replacement.is_value_type() => {
                    replacement.annotated()
                }
                Some(replacement) => replacement.clone(),
                None => self.clone(),
            };
        }
        if !self.any_var(|v| subst.contains_key(&v)) {
            return self.clone();
        }
        Shape::new(self.ty().map_children(|child| child.substitute(subst)))
            .with_nullability(self.nullability())
    }

    /// The same tree with every annotation set to oblivious.
    pub fn erase_nullability(&self) -> Shape {
        Shape::new(self.ty().map_children(Shape::erase_nullability))
            .with_nullability(Nullability::Oblivious)
    }

    pub fn eq_ignoring_nullability(&self, other: &Shape) -> bool {
        if self.ty == other.ty {
            return true;
        }
        match (self.ty(), other.ty()) {
            (Ty::Var(a), Ty::Var(b)) => a == b,
            (Ty::Named(a), Ty::Named(b)) => {
                a.def == b.def && all_eq_ignoring_nullability(&a.args, &b.args)
            }
            (Ty::Array { elem: a, rank: ra }, Ty::Array { elem: b, rank: rb }) => {
                ra == rb && a.eq_ignoring_nullability(b)
            }
            (Ty::Pointer(a), Ty::Pointer(b)) => a.eq_ignoring_nullability(b),
            (Ty::Tuple(a), Ty::Tuple(b)) => all_eq_ignoring_nullability(a, b),
            (Ty::FnPtr(a), Ty::FnPtr(b)) | (Ty::Function(a), Ty::Function(b)) => {
                a.conv == b.conv
                    && a.ret_ref == b.ret_ref
                    && a.params.len() == b.params.len()
                    && a
                        .params
                        .iter()
                        .zip(&b.params)
                        .all(|(pa, pb)| {
                            pa.ref_kind == pb.ref_kind && pa.ty.eq_ignoring_nullability(&pb.ty)
                        })
                    && a.ret.eq_ignoring_nullability(&b.ret)
            }
            (Ty::Dynamic, Ty::Dynamic) => true,
            (Ty::Error(a), Ty::Error(b)) => a == b,
            _ => false,
        }
    }
}

fn all_eq_ignoring_nullability(a: &[Shape], b: &[Shape]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignoring_nullability(y))
}

use shape::{Nullability, Shape, Substitution};

/// How a bound relates to its variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    /// `T = X`
    Exact,
    /// The pattern an explicit type argument gives, e.g. `List<_>`.
    Shape,
    /// `X` converts to `T`.
    LowerBound,
    /// `T` converts to `X`.
    UpperBound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fixed {
    pub ty: Shape,
    pub from_function_type: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct VarBounds {
    pub exact: Vec<Shape>,
    pub lower: Vec<Shape>,
    pub upper: Vec<Shape>,
    pub shape: Option<Shape>,
    pub fixed: Option<Fixed>,
    /// Joined annotations of untyped arguments flowing into the variable.
    pub nullable_lower: Nullability,
}

impl Default for VarBounds {
    fn default() -> Self {
        VarBounds {
            exact: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            shape: None,
            fixed: None,
            nullable_lower: Nullability::NotAnnotated,
        }
    }
}

/// Per-variable bound sets. Sets keep insertion order so every session is
/// deterministic, and de-duplicate by full structural equality (annotations
/// included).
#[derive(Debug, Clone)]
pub(crate) struct BoundStore {
    vars: Vec<VarBounds>,
}

impl BoundStore {
    pub fn new(count: usize) -> Self {
        BoundStore {
            vars: vec![VarBounds::default(); count],
        }
    }

    pub fn var(&self, idx: usize) -> &VarBounds {
        &self.vars[idx]
    }

    /// The set a bound of `kind` goes into. Shape bounds have no set.
    pub fn get(&self, idx: usize, kind: BoundKind) -> &[Shape] {
        let var = &self.vars[idx];
        match kind {
            BoundKind::Exact => &var.exact,
            BoundKind::LowerBound => &var.lower,
            BoundKind::UpperBound => &var.upper,
            BoundKind::Shape => &[],
        }
    }

    /// Returns false if the bound was already recorded.
    pub fn add(&mut self, idx: usize, kind: BoundKind, bound: Shape) -> bool {
        let var = &mut self.vars[idx];
        debug_assert!(var.fixed.is_none(), "bound added to a fixed variable");
        let set = match kind {
            BoundKind::Exact => &mut var.exact,
            BoundKind::LowerBound => &mut var.lower,
            BoundKind::UpperBound => &mut var.upper,
            BoundKind::Shape => unreachable!("shape bounds use set_shape"),
        };
        if set.contains(&bound) {
            return false;
        }
        set.push(bound);
        true
    }

    pub fn shape(&self, idx: usize) -> Option<&Shape> {
        self.vars[idx].shape.as_ref()
    }

    pub fn set_shape(&mut self, idx: usize, shape: Shape) {
        let slot = &mut self.vars[idx].shape;
        debug_assert!(
            slot.as_ref().map_or(true, |old| *old == shape),
            "a variable has a single shape"
        );
        *slot = Some(shape);
    }

    pub fn add_nullable_hint(&mut self, idx: usize, hint: Nullability) {
        let slot = &mut self.vars[idx].nullable_lower;
        *slot = slot.join(hint);
    }

    pub fn is_unfixed(&self, idx: usize) -> bool {
        self.vars[idx].fixed.is_none()
    }

    pub fn fixed(&self, idx: usize) -> Option<&Fixed> {
        self.vars[idx].fixed.as_ref()
    }

    /// Fixing happens once per variable.
    pub fn fix(&mut self, idx: usize, fixed: Fixed) {
        let slot = &mut self.vars[idx].fixed;
        assert!(slot.is_none(), "variable fixed twice");
        *slot = Some(fixed);
    }

    /// Some bound (or the shape) is fully known, i.e. mentions no session
    /// variable according to `mentions_var`.
    pub fn has_bound(&self, idx: usize, mentions_var: impl Fn(&Shape) -> bool) -> bool {
        let var = &self.vars[idx];
        var.exact
            .iter()
            .chain(&var.lower)
            .chain(&var.upper)
            .chain(&var.shape)
            .any(|b| !mentions_var(b))
    }

    pub fn substitute_bounds(&mut self, idx: usize, subst: &Substitution) {
        let var = &mut self.vars[idx];
        for set in [&mut var.exact, &mut var.lower, &mut var.upper] {
            let mut rebuilt: Vec<Shape> = Vec::with_capacity(set.len());
            for bound in set.iter() {
                let bound = bound.substitute(subst);
                if !rebuilt.contains(&bound) {
                    rebuilt.push(bound);
                }
            }
            *set = rebuilt;
        }
    }

    pub fn substitute_shape(&mut self, idx: usize, subst: &Substitution) {
        if let Some(shape) = &mut self.vars[idx].shape {
            *shape = shape.substitute(subst);
        }
    }
}

use crate::Variance;

/// Nullable annotation carried next to every shape node.
///
/// Ordered `Oblivious < NotAnnotated < Annotated` so that `join` and `meet`
/// are plain max and min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Nullability {
    #[default]
    Oblivious,
    NotAnnotated,
    Annotated,
}

impl Nullability {
    pub fn join(self, other: Nullability) -> Nullability {
        self.max(other)
    }

    pub fn meet(self, other: Nullability) -> Nullability {
        self.min(other)
    }

    /// Used for invariant positions: an oblivious side defers to the other
    /// side, otherwise the first side wins.
    pub fn ensure_compatible(self, other: Nullability) -> Nullability {
        match (self, other) {
            (Nullability::Oblivious, other) => other,
            (this, _) => this,
        }
    }

    pub fn merge(self, other: Nullability, variance: Variance) -> Nullability {
        match variance {
            Variance::Out => self.join(other),
            Variance::In => self.meet(other),
            Variance::Invariant => self.ensure_compatible(other),
        }
    }

    pub(crate) fn suffix(self) -> &'static str {
        match self {
            Nullability::Annotated => "?",
            Nullability::NotAnnotated => "",
            Nullability::Oblivious => "~",
        }
    }
}

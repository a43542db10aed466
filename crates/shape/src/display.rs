use std::fmt;

use crate::{DefTable, Nullability, RefKind, Shape, SigParam, Signature, Ty};

/// Renders a shape with the names from its table, e.g. `IList<string?>`.
pub struct ShapeDisplay<'a> {
    table: &'a DefTable,
    shape: &'a Shape,
}

impl<'a> ShapeDisplay<'a> {
    pub(crate) fn new(table: &'a DefTable, shape: &'a Shape) -> Self {
        ShapeDisplay { table, shape }
    }

    fn child(&self, shape: &'a Shape) -> ShapeDisplay<'a> {
        ShapeDisplay::new(self.table, shape)
    }

    fn list(&self, f: &mut fmt::Formatter<'_>, shapes: &'a [Shape]) -> fmt::Result {
        for (idx, shape) in shapes.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.child(shape))?;
        }
        Ok(())
    }

    fn param(&self, f: &mut fmt::Formatter<'_>, param: &'a SigParam) -> fmt::Result {
        write!(f, "{}{}", ref_prefix(param.ref_kind), self.child(&param.ty))
    }

    fn sig_params(&self, f: &mut fmt::Formatter<'_>, sig: &'a Signature) -> fmt::Result {
        for (idx, param) in sig.params.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            self.param(f, param)?;
        }
        Ok(())
    }
}

fn ref_prefix(kind: RefKind) -> &'static str {
    match kind {
        RefKind::None => "",
        RefKind::Ref => "ref ",
        RefKind::Out => "out ",
        RefKind::In => "in ",
    }
}

impl fmt::Display for ShapeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape.ty() {
            Ty::Var(var) => write!(f, "{}", self.table.var(*var).name)?,
            Ty::Named(named) => {
                write!(f, "{}", self.table.def(named.def).name)?;
                if !named.args.is_empty() {
                    write!(f, "<")?;
                    self.list(f, &named.args)?;
                    write!(f, ">")?;
                }
            }
            Ty::Array { elem, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                write!(f, "{}[{commas}]", self.child(elem))?;
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                self.list(f, elems)?;
                write!(f, ")")?;
            }
            Ty::Pointer(pointee) => write!(f, "{}*", self.child(pointee))?,
            Ty::FnPtr(sig) => {
                write!(f, "delegate*<")?;
                for param in &sig.params {
                    self.param(f, param)?;
                    write!(f, ", ")?;
                }
                write!(f, "{}{}>", ref_prefix(sig.ret_ref), self.child(&sig.ret))?;
            }
            Ty::Function(sig) => {
                write!(f, "fn(")?;
                self.sig_params(f, sig)?;
                write!(f, ") -> {}{}", ref_prefix(sig.ret_ref), self.child(&sig.ret))?;
            }
            Ty::Dynamic => write!(f, "dynamic")?,
            Ty::Error(Some(name)) => write!(f, "{name}")?,
            Ty::Error(None) => write!(f, "?")?,
        }
        if self.shape.nullability() == Nullability::Annotated {
            write!(f, "?")?;
        }
        Ok(())
    }
}

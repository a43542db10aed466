use std::sync::Arc;

use itertools::Itertools;
use la_arena::Arena;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::{
    DefId, DefKind, NamedTy, Shape, ShapeDisplay, Signature, Substitution, Ty, TyVar,
    TypeStructure, Variance,
};

/// Bases and interfaces are walked at most this deep; declarations are
/// trusted to be acyclic but a bad table must not hang inference.
const MAX_HIERARCHY_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: SmolStr,
    pub kind: DefKind,
    pub params: Vec<TyVar>,
    pub variance: Arc<[Variance]>,
    /// Written in terms of `params`.
    pub base: Option<Shape>,
    /// Directly implemented (or, for interfaces, inherited) interfaces.
    pub interfaces: Vec<Shape>,
    /// Invoke signature of a delegate.
    pub invoke: Option<Signature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// A declared type parameter.
    Param,
    /// A `_` written in an explicit type-argument list.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct TyVarData {
    pub name: SmolStr,
    pub kind: VarKind,
    pub constraints: Vec<Shape>,
    /// `where T : class`
    pub reference_type: bool,
}

/// Definitions every table starts with.
#[derive(Debug, Clone)]
pub struct WellKnown {
    pub object: DefId,
    pub string: DefId,
    pub void: DefId,
    pub bool: DefId,
    pub byte: DefId,
    pub int: DefId,
    pub long: DefId,
    pub float: DefId,
    pub double: DefId,
    pub nullable: DefId,
    pub ienumerable: DefId,
    pub icollection: DefId,
    pub ilist: DefId,
    pub ireadonly_collection: DefId,
    pub ireadonly_list: DefId,
    pub expression: DefId,
    pub lambda_expression: DefId,
    pub expression_of: DefId,
    /// Indexed by parameter count.
    pub funcs: Vec<DefId>,
    pub actions: Vec<DefId>,
}

impl WellKnown {
    fn array_interfaces(&self) -> [DefId; 5] {
        [
            self.ilist,
            self.icollection,
            self.ienumerable,
            self.ireadonly_list,
            self.ireadonly_collection,
        ]
    }

    pub(crate) fn numeric_rank(&self, def: DefId) -> Option<u8> {
        [self.byte, self.int, self.long, self.float, self.double]
            .iter()
            .position(|d| *d == def)
            .map(|p| p as u8)
    }
}

/// Arena of type definitions and type variables.
#[derive(Debug, Clone)]
pub struct DefTable {
    defs: Arena<TypeDef>,
    vars: Arena<TyVarData>,
    well_known: WellKnown,
}

impl Default for DefTable {
    fn default() -> Self {
        Self::new()
    }
}

fn declare_in(
    defs: &mut Arena<TypeDef>,
    vars: &mut Arena<TyVarData>,
    name: &str,
    kind: DefKind,
    params: &[(&str, Variance)],
) -> (DefId, Vec<TyVar>) {
    let vars: Vec<TyVar> = params
        .iter()
        .map(|(name, _)| {
            vars.alloc(TyVarData {
                name: (*name).into(),
                kind: VarKind::Param,
                constraints: Vec::new(),
                reference_type: false,
            })
        })
        .collect();
    let def = defs.alloc(TypeDef {
        name: name.into(),
        kind,
        params: vars.clone(),
        variance: params.iter().map(|(_, v)| *v).collect(),
        base: None,
        interfaces: Vec::new(),
        invoke: None,
    });
    (def, vars)
}

impl DefTable {
    pub fn new() -> Self {
        use DefKind::*;
        use Variance::*;

        let mut defs = Arena::default();
        let mut vars = Arena::default();
        let mut decl = |name: &str, kind, params: &[(&str, Variance)]| {
            declare_in(&mut defs, &mut vars, name, kind, params).0
        };

        let object = decl("object", Class, &[]);
        let string = decl("string", Class, &[]);
        let void = decl("void", Struct, &[]);
        let bool = decl("bool", Struct, &[]);
        let byte = decl("byte", Struct, &[]);
        let int = decl("int", Struct, &[]);
        let long = decl("long", Struct, &[]);
        let float = decl("float", Struct, &[]);
        let double = decl("double", Struct, &[]);
        let nullable = decl("Nullable", Struct, &[("T", Invariant)]);
        let ienumerable = decl("IEnumerable", Interface, &[("T", Out)]);
        let icollection = decl("ICollection", Interface, &[("T", Invariant)]);
        let ilist = decl("IList", Interface, &[("T", Invariant)]);
        let ireadonly_collection = decl("IReadOnlyCollection", Interface, &[("T", Out)]);
        let ireadonly_list = decl("IReadOnlyList", Interface, &[("T", Out)]);
        let expression = decl("Expression", Class, &[]);
        let lambda_expression = decl("LambdaExpression", Class, &[]);
        let expression_of = decl("Expression", Class, &[("TDelegate", Invariant)]);

        let mut funcs = Vec::new();
        let mut actions = Vec::new();
        for arity in 0..=4 {
            let inputs = (1..=arity).map(|i| format!("T{i}")).collect_vec();
            let mut params = inputs.iter().map(|n| (n.as_str(), In)).collect_vec();
            actions.push(decl("Action", Delegate, &params));
            params.push(("TResult", Out));
            funcs.push(decl("Func", Delegate, &params));
        }

        let mut table = DefTable {
            defs,
            vars,
            well_known: WellKnown {
                object,
                string,
                void,
                bool,
                byte,
                int,
                long,
                float,
                double,
                nullable,
                ienumerable,
                icollection,
                ilist,
                ireadonly_collection,
                ireadonly_list,
                expression,
                lambda_expression,
                expression_of,
                funcs,
                actions,
            },
        };
        table.wire_well_known();
        table
    }

    fn wire_well_known(&mut self) {
        let wk = self.well_known.clone();
        let elem = |table: &DefTable, def: DefId| table.param_shape(def, 0);

        // ICollection<T> : IEnumerable<T>, IList<T> : ICollection<T>, ...
        for (child, parent) in [
            (wk.icollection, wk.ienumerable),
            (wk.ilist, wk.icollection),
            (wk.ireadonly_collection, wk.ienumerable),
            (wk.ireadonly_list, wk.ireadonly_collection),
        ] {
            let iface = self.named(parent, [elem(self, child)]);
            self.add_interface(child, iface);
        }

        let expression = self.named(wk.expression, []);
        self.set_base(wk.lambda_expression, expression);
        let lambda = self.named(wk.lambda_expression, []);
        self.set_base(wk.expression_of, lambda);

        for (arity, (&func, &action)) in wk.funcs.iter().zip(&wk.actions).enumerate() {
            let inputs = (0..arity).map(|i| self.param_shape(func, i)).collect_vec();
            let ret = self.param_shape(func, arity);
            self.set_invoke(func, Signature::new(inputs, ret));

            let inputs = (0..arity).map(|i| self.param_shape(action, i)).collect_vec();
            let void = self.void();
            self.set_invoke(action, Signature::new(inputs, void));
        }
    }

    fn param_shape(&self, def: DefId, idx: usize) -> Shape {
        Shape::var(self.defs[def].params[idx])
    }

    // ==========================================================================
    // Declaring
    // ==========================================================================

    pub fn declare(
        &mut self,
        name: &str,
        kind: DefKind,
        params: &[(&str, Variance)],
    ) -> (DefId, Vec<TyVar>) {
        declare_in(&mut self.defs, &mut self.vars, name, kind, params)
    }

    pub fn class(&mut self, name: &str, params: &[&str]) -> (DefId, Vec<TyVar>) {
        self.declare(name, DefKind::Class, &invariant(params))
    }

    pub fn struct_type(&mut self, name: &str, params: &[&str]) -> (DefId, Vec<TyVar>) {
        self.declare(name, DefKind::Struct, &invariant(params))
    }

    pub fn interface(&mut self, name: &str, params: &[(&str, Variance)]) -> (DefId, Vec<TyVar>) {
        self.declare(name, DefKind::Interface, params)
    }

    /// Declare a delegate; `invoke` receives the delegate's own type
    /// parameters as shapes.
    pub fn delegate(
        &mut self,
        name: &str,
        params: &[(&str, Variance)],
        invoke: impl FnOnce(&Self, &[Shape]) -> Signature,
    ) -> (DefId, Vec<TyVar>) {
        let (def, vars) = self.declare(name, DefKind::Delegate, params);
        let shapes = vars.iter().copied().map(Shape::var).collect_vec();
        let sig = invoke(self, &shapes);
        self.set_invoke(def, sig);
        (def, vars)
    }

    pub fn set_base(&mut self, def: DefId, base: Shape) {
        self.defs[def].base = Some(base);
    }

    pub fn add_interface(&mut self, def: DefId, iface: Shape) {
        self.defs[def].interfaces.push(iface);
    }

    pub fn set_invoke(&mut self, def: DefId, sig: Signature) {
        self.defs[def].invoke = Some(sig);
    }

    /// A method type parameter.
    pub fn type_param(&mut self, name: &str) -> TyVar {
        self.new_var(name, VarKind::Param)
    }

    pub fn placeholder(&mut self) -> TyVar {
        self.new_var("_", VarKind::Placeholder)
    }

    fn new_var(&mut self, name: &str, kind: VarKind) -> TyVar {
        self.vars.alloc(TyVarData {
            name: name.into(),
            kind,
            constraints: Vec::new(),
            reference_type: false,
        })
    }

    pub fn add_constraint(&mut self, var: TyVar, constraint: Shape) {
        self.vars[var].constraints.push(constraint);
    }

    pub fn require_reference_type(&mut self, var: TyVar) {
        self.vars[var].reference_type = true;
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn def(&self, def: DefId) -> &TypeDef {
        &self.defs[def]
    }

    pub fn var(&self, var: TyVar) -> &TyVarData {
        &self.vars[var]
    }

    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    pub fn display<'a>(&'a self, shape: &'a Shape) -> ShapeDisplay<'a> {
        ShapeDisplay::new(self, shape)
    }

    // ==========================================================================
    // Building shapes
    // ==========================================================================

    pub fn named(&self, def: DefId, args: impl IntoIterator<Item = Shape>) -> Shape {
        let decl = &self.defs[def];
        let args = args.into_iter().collect_vec();
        debug_assert_eq!(
            args.len(),
            decl.params.len(),
            "wrong number of type arguments for {}",
            decl.name
        );
        Shape::new(Ty::Named(NamedTy {
            def,
            kind: decl.kind,
            args,
            variance: decl.variance.clone(),
        }))
    }

    pub fn object(&self) -> Shape {
        self.named(self.well_known.object, [])
    }

    pub fn string(&self) -> Shape {
        self.named(self.well_known.string, [])
    }

    pub fn void(&self) -> Shape {
        self.named(self.well_known.void, [])
    }

    pub fn bool(&self) -> Shape {
        self.named(self.well_known.bool, [])
    }

    pub fn int(&self) -> Shape {
        self.named(self.well_known.int, [])
    }

    pub fn long(&self) -> Shape {
        self.named(self.well_known.long, [])
    }

    pub fn double(&self) -> Shape {
        self.named(self.well_known.double, [])
    }

    pub fn nullable_of(&self, underlying: Shape) -> Shape {
        self.named(self.well_known.nullable, [underlying])
    }

    pub fn ienumerable(&self, elem: Shape) -> Shape {
        self.named(self.well_known.ienumerable, [elem])
    }

    pub fn ilist(&self, elem: Shape) -> Shape {
        self.named(self.well_known.ilist, [elem])
    }

    /// `Func<params.., ret>`; panics past four parameters.
    pub fn func(&self, params: impl IntoIterator<Item = Shape>, ret: Shape) -> Shape {
        let mut args = params.into_iter().collect_vec();
        let def = self.well_known.funcs[args.len()];
        args.push(ret);
        self.named(def, args)
    }

    pub fn action(&self, params: impl IntoIterator<Item = Shape>) -> Shape {
        let args = params.into_iter().collect_vec();
        self.named(self.well_known.actions[args.len()], args)
    }

    pub fn expression_of(&self, delegate: Shape) -> Shape {
        self.named(self.well_known.expression_of, [delegate])
    }

    // ==========================================================================
    // Hierarchy helpers
    // ==========================================================================

    /// `shape` written against `def`'s parameters, instantiated with `args`.
    fn instantiate(&self, def: DefId, args: &[Shape], shape: &Shape) -> Shape {
        let subst: Substitution = self.defs[def]
            .params
            .iter()
            .copied()
            .zip(args.iter().cloned())
            .collect();
        shape.substitute(&subst)
    }

    fn effective_base_class(&self, var: TyVar) -> Shape {
        self.vars[var]
            .constraints
            .iter()
            .find(|c| c.as_named().is_some_and(|n| n.kind == DefKind::Class))
            .cloned()
            .unwrap_or_else(|| self.object())
    }

    fn collect_interfaces(&self, ty: &Shape, depth: usize, out: &mut Vec<Shape>) {
        if depth > MAX_HIERARCHY_DEPTH {
            log::debug!("interface walk of {} exceeded depth", self.display(ty));
            return;
        }
        let push = |iface: Shape, out: &mut Vec<Shape>| {
            if !out.contains(&iface) {
                out.push(iface.clone());
            }
            self.collect_interfaces(&iface, depth + 1, out);
        };
        match ty.ty() {
            Ty::Named(named) => {
                for iface in &self.defs[named.def].interfaces {
                    push(self.instantiate(named.def, &named.args, iface), out);
                }
                if let Some(base) = self.base_type(ty) {
                    self.collect_interfaces(&base, depth + 1, out);
                }
            }
            Ty::Array { elem, rank: 1 } => {
                for def in self.well_known.array_interfaces() {
                    push(self.named(def, [elem.clone()]), out);
                }
            }
            Ty::Var(var) => {
                self.collect_interfaces(&self.effective_base_class(*var), depth + 1, out);
                for constraint in &self.vars[*var].constraints {
                    if constraint
                        .as_named()
                        .is_some_and(|n| n.kind == DefKind::Interface)
                    {
                        push(constraint.clone(), out);
                    }
                }
            }
            _ => {}
        }
    }

    /// Walk the base chain of `ty`, starting with `ty` itself.
    pub fn base_chain(&self, ty: &Shape) -> Vec<Shape> {
        let mut chain = vec![ty.clone()];
        let mut seen = FxHashSet::default();
        while let Some(base) = chain.last().and_then(|last| self.base_type(last)) {
            if chain.len() > MAX_HIERARCHY_DEPTH || !seen.insert(base.clone()) {
                break;
            }
            chain.push(base);
        }
        chain
    }
}

fn invariant<'a>(params: &[&'a str]) -> Vec<(&'a str, Variance)> {
    params.iter().map(|p| (*p, Variance::Invariant)).collect()
}

impl TypeStructure for DefTable {
    fn base_type(&self, ty: &Shape) -> Option<Shape> {
        match ty.ty() {
            Ty::Named(named) => {
                let decl = &self.defs[named.def];
                if let Some(base) = &decl.base {
                    return Some(self.instantiate(named.def, &named.args, base));
                }
                match decl.kind {
                    DefKind::Interface => None,
                    _ if named.def == self.well_known.object => None,
                    _ => Some(self.object()),
                }
            }
            Ty::Var(var) => Some(self.effective_base_class(*var)),
            Ty::Array { .. } | Ty::Tuple(_) | Ty::Function(_) => Some(self.object()),
            _ => None,
        }
    }

    fn all_interfaces(&self, ty: &Shape) -> Vec<Shape> {
        let mut out = Vec::new();
        self.collect_interfaces(ty, 0, &mut out);
        out
    }

    fn is_reference_type(&self, ty: &Shape) -> bool {
        match ty.ty() {
            Ty::Named(named) => !named.kind.is_value_type(),
            Ty::Array { .. } | Ty::Dynamic | Ty::Function(_) => true,
            Ty::Var(var) => {
                let data = &self.vars[*var];
                data.reference_type
                    || data.constraints.iter().any(|c| {
                        c.as_named()
                            .is_some_and(|n| n.kind == DefKind::Class && n.def != self.well_known.object)
                    })
            }
            Ty::Tuple(_) | Ty::Pointer(_) | Ty::FnPtr(_) | Ty::Error(_) => false,
        }
    }

    fn delegate_signature(&self, ty: &Shape) -> Option<Signature> {
        let named = ty.as_named()?;
        if named.def == self.well_known.expression_of {
            return self.delegate_signature(&named.args[0]);
        }
        let decl = &self.defs[named.def];
        if decl.kind != DefKind::Delegate {
            return None;
        }
        let invoke = decl.invoke.as_ref()?;
        Some(invoke.map(|s| self.instantiate(named.def, &named.args, s)))
    }

    fn nullable_underlying(&self, ty: &Shape) -> Option<Shape> {
        let named = ty.as_named()?;
        (named.def == self.well_known.nullable).then(|| named.args[0].clone())
    }

    fn iteration_element_type(&self, ty: &Shape) -> Option<Shape> {
        match ty.ty() {
            Ty::Array { elem, rank: 1 } => Some(elem.clone()),
            Ty::Named(named) if named.def == self.well_known.ienumerable => {
                Some(named.args[0].clone())
            }
            _ => self
                .all_interfaces(ty)
                .into_iter()
                .find_map(|iface| match iface.as_named() {
                    Some(n) if n.def == self.well_known.ienumerable => Some(n.args[0].clone()),
                    _ => None,
                }),
        }
    }

    fn is_array_generic_interface(&self, ty: &Shape) -> bool {
        ty.as_named().is_some_and(|n| {
            n.args.len() == 1 && self.well_known.array_interfaces().contains(&n.def)
        })
    }

    fn natural_delegate(&self, sig: &Signature) -> Option<Shape> {
        if sig.conv != crate::CallConv::Managed
            || sig.ret_ref.is_by_ref()
            || sig.params.iter().any(|p| p.ref_kind.is_by_ref())
            || sig.params.len() >= self.well_known.funcs.len()
        {
            return None;
        }
        let params = sig.param_types().cloned();
        if self.is_void(&sig.ret) {
            Some(self.action(params))
        } else {
            Some(self.func(params, sig.ret.clone()))
        }
    }

    fn expression_tree_of(&self, delegate: &Shape) -> Option<Shape> {
        let named = delegate.as_named()?;
        (named.kind == DefKind::Delegate).then(|| self.expression_of(delegate.clone()))
    }

    fn has_expression_tree_constraint(&self, var: TyVar) -> bool {
        let wk = &self.well_known;
        let expression_defs = [wk.expression, wk.lambda_expression, wk.expression_of];
        self.vars[var].constraints.iter().any(|c| {
            self.base_chain(c).iter().any(|b| {
                b.as_named()
                    .is_some_and(|n| expression_defs.contains(&n.def))
            })
        })
    }

    fn is_placeholder(&self, var: TyVar) -> bool {
        self.vars[var].kind == VarKind::Placeholder
    }

    fn is_void(&self, ty: &Shape) -> bool {
        ty.as_named()
            .is_some_and(|n| n.def == self.well_known.void)
    }

    fn object_type(&self) -> Shape {
        self.object()
    }

    fn type_name(&self, ty: &Shape) -> String {
        self.display(ty).to_string()
    }
}

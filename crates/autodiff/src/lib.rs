//! Reverse-mode automatic differentiation over the laurel IR.
//!
//! Given a module, the name of a function computing a scalar tensor from its
//! parameters through a single dataflow region, and a set of
//! requires-gradient inputs, [`gradient`] adds a function `<name>_adjoint`
//! that returns the original value paired with a tuple of the input
//! adjoints.

use by_address::ByAddress;
use laurel::builder::BlockBuilder;
use laurel::{
    call, member, seq, shape, tuple, var, Binding, Expr, ExprKind, Function, Module, Ty, Var,
    VarKind, VarNode,
};
use laurel_ops as ops;
use laurel_ops::gradient::Registry;
use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("function `{0}` not found in module")]
    UnknownFunction(String),

    #[error("`{0}` is not a parameter of the function being differentiated")]
    NotAParameter(String),

    #[error("cannot differentiate with respect to `{0}`: not a nested tensor")]
    NotDifferentiable(String),

    #[error("function body must be a sequence of dataflow regions")]
    BodyNotSeq,

    #[error("expected exactly one dataflow region, found {0}")]
    RegionCount(usize),

    #[error("region result must be a variable reference")]
    TargetNotVar,

    #[error("target variable `{0}` is not bound in the region")]
    UnboundTarget(String),

    #[error("target `{0}` must be a scalar tensor with a known dtype")]
    TargetNotScalar(String),

    #[error("AD does not support this binding form: {0} = {1}")]
    UnsupportedBinding(String, String),

    #[error("cannot accumulate an adjoint into {0}")]
    UnsupportedBase(String),

    #[error("no gradient registered for operator `{0}`")]
    MissingGradient(&'static str),

    #[error("gradient of `{op}` returned {got} partials for {want} arguments")]
    PartialArity {
        op: &'static str,
        want: usize,
        got: usize,
    },

    #[error("call argument {0} must be a variable reference")]
    ArgumentNotVar(String),

    #[error("projection base {0} must be a tuple-typed variable")]
    ProjectionBase(String),

    #[error("projection index {index} out of range for a tuple of {len} fields")]
    ProjectionIndex { index: usize, len: usize },

    #[error("accumulated adjoint of a tuple-typed value must be a tuple literal, got {0}")]
    AdjointNotTuple(String),

    #[error("adjoint increment for a tuple must itself be a tuple, got {0}")]
    IncrementNotTuple(String),

    #[error("tuple adjoints differ in arity: {0} vs {1}")]
    TupleArity(usize, usize),

    #[error("cannot build a zero value for {0}")]
    Zero(String),

    #[error("variable `{0}` carries no shape, cannot materialize its adjoint")]
    MissingShape(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Differentiate `name` in `module` with respect to `require_grads`, using
/// the standard gradient registry.
///
/// `require_grads` must be parameters of the named function, compared by
/// identity; when empty, every parameter receives an adjoint. The input
/// module is never modified: the result is a clone extended with one
/// function bound at `<name>_adjoint`.
pub fn gradient(module: &Module, name: &str, require_grads: &[Var]) -> Result<Module> {
    gradient_with(module, name, require_grads, ops::gradient::standard())
}

/// As [`gradient`], with an explicit primitive gradient registry.
pub fn gradient_with(
    module: &Module,
    name: &str,
    require_grads: &[Var],
    registry: &Registry,
) -> Result<Module> {
    let function = module
        .get(name)
        .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
    for g in require_grads {
        if !function.params.iter().any(|p| Rc::ptr_eq(p, g)) {
            return Err(Error::NotAParameter(g.name.clone()));
        }
        let differentiable = g.ty.as_ref().is_some_and(Ty::is_nested_tensor);
        if !differentiable {
            return Err(Error::NotDifferentiable(g.name.clone()));
        }
    }

    debug!("differentiating `{name}`");
    let mut pass = Gradient::new(registry);
    let mut transformed = pass.transform(function, require_grads)?;
    let symbol = format!("{name}_adjoint");
    transformed.global_symbol = Some(symbol.clone());

    let mut out = module.clone();
    out.add(symbol, transformed);
    Ok(out)
}

type VarKey = ByAddress<Var>;
type ExprKey = ByAddress<Expr>;

fn vkey(v: &Var) -> VarKey {
    ByAddress(v.clone())
}

fn ekey(e: &Expr) -> ExprKey {
    ByAddress(e.clone())
}

/// State of one pass invocation. All tables are keyed by node identity:
/// two structurally equal expressions are distinct entries.
struct Gradient<'a> {
    registry: &'a Registry,
    builder: BlockBuilder,
    /// Original variable to its adjoint variable; one entry per variable
    /// ever given an adjoint, kind mirroring the original's.
    adjoint_vars: FxHashMap<VarKey, Var>,
    /// Original variable to its accumulated, not-yet-bound adjoint
    /// expression. Tuple-typed entries are always tuple literals.
    adjoint_exprs: FxHashMap<VarKey, Expr>,
    /// Expressions already bound, to their binding variable; repeated
    /// occurrences collapse to a reference.
    bound: FxHashMap<ExprKey, Var>,
    /// Structural zeros produced while building empty nested tuples.
    zeros: FxHashSet<ExprKey>,
}

impl<'a> Gradient<'a> {
    fn new(registry: &'a Registry) -> Self {
        Gradient {
            registry,
            builder: BlockBuilder::new(),
            adjoint_vars: FxHashMap::default(),
            adjoint_exprs: FxHashMap::default(),
            bound: FxHashMap::default(),
            zeros: FxHashSet::default(),
        }
    }

    fn transform(&mut self, f: &Function, require_grads: &[Var]) -> Result<Function> {
        let ExprKind::Seq { regions, result } = &f.body.kind else {
            return Err(Error::BodyNotSeq);
        };
        if regions.len() != 1 {
            return Err(Error::RegionCount(regions.len()));
        }
        let ExprKind::Var(old_target) = &result.kind else {
            return Err(Error::TargetNotVar);
        };
        check_target(old_target)?;

        // Fresh parameters, then the forward region re-emitted over them, so
        // the new function owns its variable identities.
        let mut remap: FxHashMap<VarKey, Var> = FxHashMap::default();
        let params: Vec<Var> = f
            .params
            .iter()
            .map(|p| {
                let fresh = clone_var(p);
                remap.insert(vkey(p), fresh.clone());
                fresh
            })
            .collect();

        self.builder.begin_region();
        let mut bindings = Vec::with_capacity(regions[0].bindings.len());
        for b in &regions[0].bindings {
            let value = substitute(&b.value, &remap);
            let v = clone_var(&b.var);
            remap.insert(vkey(&b.var), v.clone());
            match v.kind {
                VarKind::Intermediate => self.builder.emit(v.clone(), value.clone()),
                VarKind::Output => self.builder.emit_output(v.clone(), value.clone()),
            };
            bindings.push(Binding { var: v, value });
        }

        let target = remap
            .get(&vkey(old_target))
            .cloned()
            .ok_or_else(|| Error::UnboundTarget(old_target.name.clone()))?;

        // Inputs selected for gradient, in requires-gradient order; all of
        // them when the set is empty.
        let selected: Vec<Var> = if require_grads.is_empty() {
            params.clone()
        } else {
            require_grads
                .iter()
                .map(|g| remap[&vkey(g)].clone())
                .collect()
        };
        for p in &selected {
            self.adjoint_var(p);
        }

        for binding in bindings.iter().rev() {
            self.reverse_visit(binding, &target)?;
        }

        self.finalize_inputs(&selected)?;

        let adjoints: Vec<Var> = selected
            .iter()
            .map(|p| self.adjoint_vars[&vkey(p)].clone())
            .collect();
        let adjoint_tuple = tuple(adjoints.iter().map(var).collect());
        let ret = self
            .builder
            .normalize(tuple(vec![var(&target), adjoint_tuple]));
        let region = self.builder.end_region();
        debug!(
            "emitted {} bindings for `{}`",
            region.bindings.len(),
            target.name
        );

        let ret_ty = Some(Ty::Tuple {
            fields: vec![
                f.ret_ty.clone().or_else(|| target.ty.clone()).unwrap_or(Ty::Tensor {
                    ndim: None,
                    dtype: None,
                }),
                Ty::Tuple {
                    fields: adjoints
                        .iter()
                        .map(|a| {
                            a.ty.clone().unwrap_or(Ty::Tensor {
                                ndim: None,
                                dtype: None,
                            })
                        })
                        .collect(),
                },
            ],
        });

        Ok(Function {
            params,
            body: seq(vec![region], ret),
            ret_ty,
            global_symbol: None,
        })
    }

    /// One step of the reverse walk over a forward binding `x := e`.
    fn reverse_visit(&mut self, binding: &Binding, target: &Var) -> Result<()> {
        let x = &binding.var;
        let adjoint_var = self.adjoint_var(x);

        if !self.adjoint_exprs.contains_key(&vkey(x)) {
            if Rc::ptr_eq(x, target) {
                self.seed_target(x);
            } else {
                // contributes nothing to the target
                trace!("skipping `{}`", x.name);
                return Ok(());
            }
        }

        let adjoint = self.adjoint_exprs[&vkey(x)].clone();
        self.bind_and_emit(&adjoint_var, adjoint.clone());

        match &binding.value.kind {
            ExprKind::Tuple(_) | ExprKind::Member { .. } | ExprKind::Var(_) => {
                self.update(&binding.value, adjoint)
            }
            ExprKind::Call { op, args, .. } => {
                let grad = self
                    .registry
                    .get(*op)
                    .ok_or(Error::MissingGradient(op.name))?;
                let partials = grad(&binding.value, &var(&adjoint_var));
                if partials.len() != args.len() {
                    return Err(Error::PartialArity {
                        op: op.name,
                        want: args.len(),
                        got: partials.len(),
                    });
                }
                for (arg, partial) in args.iter().zip(partials) {
                    if !matches!(arg.kind, ExprKind::Var(_)) {
                        return Err(Error::ArgumentNotVar(arg.to_string()));
                    }
                    self.update(arg, partial)?;
                }
                Ok(())
            }
            _ => Err(Error::UnsupportedBinding(
                x.name.clone(),
                binding.value.to_string(),
            )),
        }
    }

    /// The gradient of the target with respect to itself: a tensor of ones
    /// with the target's shape and dtype. Not a structural zero.
    fn seed_target(&mut self, target: &Var) {
        let sh = target.shape.clone().unwrap_or_else(|| shape(vec![]));
        let dtype = target
            .ty
            .as_ref()
            .and_then(Ty::dtype)
            .expect("checked by check_target");
        self.adjoint_exprs
            .insert(vkey(target), ops::ones(sh, dtype));
    }

    /// Accumulate `increment` into the adjoint of `base`.
    fn update(&mut self, base: &Expr, increment: Expr) -> Result<()> {
        match &base.kind {
            ExprKind::Var(v) => {
                match self.adjoint_exprs.get(&vkey(v)).cloned() {
                    Some(current) => {
                        let updated = self.add(current, increment)?;
                        self.adjoint_exprs.insert(vkey(v), updated);
                    }
                    None => {
                        // A first contribution that was already bound is
                        // stored as a reference to its variable.
                        let increment = match self.bound.get(&ekey(&increment)) {
                            Some(b) => var(b),
                            None => increment,
                        };
                        self.adjoint_exprs.insert(vkey(v), increment);
                    }
                }
                Ok(())
            }
            ExprKind::Tuple(fields) => {
                let ExprKind::Tuple(inc_fields) = &increment.kind else {
                    return Err(Error::IncrementNotTuple(increment.to_string()));
                };
                if fields.len() != inc_fields.len() {
                    return Err(Error::TupleArity(fields.len(), inc_fields.len()));
                }
                for (field, inc) in fields.iter().zip(inc_fields.clone()) {
                    self.update(field, inc)?;
                }
                Ok(())
            }
            ExprKind::Member { tuple: base_tuple, index } => {
                let ExprKind::Var(v) = &base_tuple.kind else {
                    return Err(Error::ProjectionBase(base_tuple.to_string()));
                };
                if !matches!(v.ty, Some(Ty::Tuple { .. })) {
                    return Err(Error::ProjectionBase(v.name.clone()));
                }
                if !self.adjoint_exprs.contains_key(&vkey(v)) {
                    let sh = v
                        .shape
                        .clone()
                        .ok_or_else(|| Error::MissingShape(v.name.clone()))?;
                    let ty = v.ty.clone().unwrap();
                    let init = self.empty_nested_tuple(&sh, &ty)?;
                    init.set_ty(v.ty.clone());
                    init.set_shape(v.shape.clone());
                    self.adjoint_exprs.insert(vkey(v), init);
                }
                let current = self.adjoint_exprs[&vkey(v)].clone();
                let ExprKind::Tuple(fields) = &current.kind else {
                    return Err(Error::AdjointNotTuple(current.to_string()));
                };
                if *index >= fields.len() {
                    return Err(Error::ProjectionIndex {
                        index: *index,
                        len: fields.len(),
                    });
                }
                let mut fields = fields.clone();
                fields[*index] = self.add(fields[*index].clone(), increment)?;
                let updated = tuple(fields);
                updated.set_ty(current.ty());
                updated.set_shape(current.shape());
                self.adjoint_exprs.insert(vkey(v), updated);
                Ok(())
            }
            _ => Err(Error::UnsupportedBase(base.to_string())),
        }
    }

    /// Addition with zero elimination. Structural zeros are absorbed by
    /// identity; tuple literals add field-wise; otherwise the new
    /// contribution is intern-substituted before an `add` node is built, so
    /// repeated sub-expressions appear by reference.
    fn add(&mut self, s1: Expr, s2: Expr) -> Result<Expr> {
        if self.zeros.contains(&ekey(&s1)) {
            return Ok(s2);
        }
        if self.zeros.contains(&ekey(&s2)) {
            return Ok(s1);
        }
        if let ExprKind::Tuple(f1) = &s1.kind {
            let ExprKind::Tuple(f2) = &s2.kind else {
                return Err(Error::IncrementNotTuple(s2.to_string()));
            };
            if f1.len() != f2.len() {
                return Err(Error::TupleArity(f1.len(), f2.len()));
            }
            let fields = f1
                .clone()
                .into_iter()
                .zip(f2.clone())
                .map(|(a, b)| self.add(a, b))
                .collect::<Result<Vec<_>>>()?;
            return Ok(tuple(fields));
        }
        let rhs = match self.bound.get(&ekey(&s2)) {
            Some(v) => var(v),
            None => s2,
        };
        Ok(ops::add(s1, rhs))
    }

    /// A tuple literal mirroring the nesting of `shape`/`ty` whose leaves
    /// are `zeros` calls, each registered as a structural zero.
    fn empty_nested_tuple(&mut self, shape: &Expr, ty: &Ty) -> Result<Expr> {
        let ExprKind::Tuple(shape_fields) = &shape.kind else {
            return Err(Error::Zero(shape.to_string()));
        };
        let Ty::Tuple { fields: ty_fields } = ty else {
            return Err(Error::Zero(shape.to_string()));
        };
        if shape_fields.len() != ty_fields.len() {
            return Err(Error::TupleArity(shape_fields.len(), ty_fields.len()));
        }
        let mut out = Vec::with_capacity(shape_fields.len());
        for (sf, tf) in shape_fields.iter().zip(ty_fields) {
            match &sf.kind {
                ExprKind::Tuple(_) => out.push(self.empty_nested_tuple(sf, tf)?),
                ExprKind::Shape(_) => {
                    let dtype = tf.dtype().ok_or_else(|| Error::Zero(sf.to_string()))?;
                    let zero = ops::zeros(sf.clone(), dtype);
                    self.zeros.insert(ekey(&zero));
                    out.push(zero);
                }
                _ => return Err(Error::Zero(sf.to_string())),
            }
        }
        Ok(tuple(out))
    }

    /// Bind `e` to `v` and emit the binding. If `e` was already bound, the
    /// previously bound variable stands in for it, so `v` aliases that
    /// variable for all later lookups; otherwise `e` is recorded and stamped
    /// with `v`'s shape and type.
    fn bind_and_emit(&mut self, v: &Var, e: Expr) {
        let e = match self.bound.get(&ekey(&e)) {
            Some(prev) => var(prev),
            None => {
                self.bound.insert(ekey(&e), v.clone());
                e.set_ty(v.ty.clone());
                e.set_shape(v.shape.clone());
                e
            }
        };
        match v.kind {
            VarKind::Intermediate => self.builder.emit(v.clone(), e),
            VarKind::Output => self.builder.emit_output(v.clone(), e),
        };
    }

    /// The adjoint variable of `v`, created on first use with the same
    /// structural type, shape and kind as `v`.
    fn adjoint_var(&mut self, v: &Var) -> Var {
        if let Some(a) = self.adjoint_vars.get(&vkey(v)) {
            return a.clone();
        }
        let a = VarNode::new(
            format!("{}_adjoint", v.name),
            v.kind,
            v.ty.clone(),
            v.shape.clone(),
        );
        self.adjoint_vars.insert(vkey(v), a.clone());
        a
    }

    /// Emit the input adjoints: touched inputs first, then default zeros for
    /// inputs the target never depended on.
    fn finalize_inputs(&mut self, selected: &[Var]) -> Result<()> {
        for p in selected {
            if let Some(adjoint) = self.adjoint_exprs.get(&vkey(p)).cloned() {
                let adjoint_var = self.adjoint_var(p);
                self.bind_and_emit(&adjoint_var, adjoint);
            }
        }
        for p in selected {
            if !self.adjoint_exprs.contains_key(&vkey(p)) {
                trace!("`{}` is unreachable from the target", p.name);
                let zero = self.default_adjoint(p)?;
                let adjoint_var = self.adjoint_var(p);
                self.bind_and_emit(&adjoint_var, zero);
            }
        }
        Ok(())
    }

    /// A structural zero with the shape of `p`: a `zeros` call for tensors,
    /// leaf-by-leaf zeros for tuples.
    fn default_adjoint(&mut self, p: &Var) -> Result<Expr> {
        match &p.ty {
            Some(Ty::Tensor {
                dtype: Some(dtype), ..
            }) => {
                let sh = p
                    .shape
                    .clone()
                    .ok_or_else(|| Error::MissingShape(p.name.clone()))?;
                Ok(ops::zeros(sh, *dtype))
            }
            Some(ty @ Ty::Tuple { .. }) => {
                let sh = p
                    .shape
                    .clone()
                    .ok_or_else(|| Error::MissingShape(p.name.clone()))?;
                let ty = ty.clone();
                self.empty_nested_tuple(&sh, &ty)
            }
            _ => Err(Error::Zero(p.name.clone())),
        }
    }
}

fn check_target(target: &Var) -> Result<()> {
    let scalar = target
        .ty
        .as_ref()
        .is_some_and(|ty| ty.is_scalar_tensor() && ty.dtype().is_some());
    if !scalar {
        return Err(Error::TargetNotScalar(target.name.clone()));
    }
    Ok(())
}

/// A fresh variable structurally equal to `v`.
fn clone_var(v: &Var) -> Var {
    VarNode::new(v.name.clone(), v.kind, v.ty.clone(), v.shape.clone())
}

/// Rebuild `e` with every variable reference remapped. Shape literals and
/// unmapped variables are shared with the input.
fn substitute(e: &Expr, remap: &FxHashMap<VarKey, Var>) -> Expr {
    let out = match &e.kind {
        ExprKind::Var(v) => match remap.get(&vkey(v)) {
            Some(fresh) => var(fresh),
            None => return e.clone(),
        },
        ExprKind::Shape(_) | ExprKind::Seq { .. } => return e.clone(),
        ExprKind::Tuple(fields) => tuple(fields.iter().map(|f| substitute(f, remap)).collect()),
        ExprKind::Member { tuple: base, index } => member(substitute(base, remap), *index),
        ExprKind::Call { op, args, attrs } => call(
            *op,
            args.iter().map(|a| substitute(a, remap)).collect(),
            attrs.clone(),
        ),
    };
    if e.ty().is_some() {
        out.set_ty(e.ty());
    }
    if e.shape().is_some() {
        out.set_shape(e.shape());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use laurel::DType;

    fn pass() -> Gradient<'static> {
        Gradient::new(ops::gradient::standard())
    }

    fn t(name: &str, d: &[usize]) -> Expr {
        var(&VarNode::output(
            name,
            Some(Ty::tensor(d.len(), DType::F32)),
            Some(shape(d.to_vec())),
        ))
    }

    #[test]
    fn zero_absorbs_on_either_side() {
        let mut g = pass();
        let z = ops::zeros(shape(vec![2, 2]), DType::F32);
        g.zeros.insert(ekey(&z));
        let e = t("e", &[2, 2]);
        let left = g.add(z.clone(), e.clone()).unwrap();
        assert!(Rc::ptr_eq(&left, &e));
        let right = g.add(e.clone(), z.clone()).unwrap();
        assert!(Rc::ptr_eq(&right, &e));
    }

    #[test]
    fn zero_is_tracked_by_identity_not_structure() {
        let mut g = pass();
        let z = ops::zeros(shape(vec![2, 2]), DType::F32);
        g.zeros.insert(ekey(&z));
        // structurally equal, separately constructed: not a zero
        let lookalike = ops::zeros(shape(vec![2, 2]), DType::F32);
        let e = t("e", &[2, 2]);
        let sum = g.add(lookalike.clone(), e.clone()).unwrap();
        assert!(!Rc::ptr_eq(&sum, &e));
        assert!(matches!(&sum.kind, ExprKind::Call { op, .. } if *op == ops::ADD));
    }

    #[test]
    fn bound_contribution_is_replaced_by_its_variable() {
        let mut g = pass();
        let contribution = ops::multiply(t("a", &[2]), t("b", &[2]));
        let bound_var = VarNode::intermediate("c_adjoint", contribution.ty(), contribution.shape());
        g.bound.insert(ekey(&contribution), bound_var.clone());
        let sum = g.add(t("s", &[2]), contribution).unwrap();
        let ExprKind::Call { op, args, .. } = &sum.kind else {
            panic!("expected a call")
        };
        assert_eq!(*op, ops::ADD);
        match &args[1].kind {
            ExprKind::Var(v) => assert!(Rc::ptr_eq(v, &bound_var)),
            other => panic!("expected a variable, got {other:?}"),
        }
    }

    #[test]
    fn tuple_addition_is_field_wise_and_checks_arity() {
        let mut g = pass();
        let a = tuple(vec![t("a0", &[2]), t("a1", &[2])]);
        let b = tuple(vec![t("b0", &[2]), t("b1", &[2])]);
        let sum = g.add(a.clone(), b).unwrap();
        let ExprKind::Tuple(fields) = &sum.kind else {
            panic!("expected a tuple")
        };
        assert_eq!(fields.len(), 2);
        let short = tuple(vec![t("c0", &[2])]);
        assert!(matches!(g.add(a, short), Err(Error::TupleArity(2, 1))));
    }

    #[test]
    fn empty_nested_tuple_mirrors_nesting_and_tracks_zeros() {
        let mut g = pass();
        let sh = tuple(vec![shape(vec![2]), tuple(vec![shape(vec![3])])]);
        let ty = Ty::Tuple {
            fields: vec![
                Ty::tensor(1, DType::F32),
                Ty::Tuple {
                    fields: vec![Ty::tensor(1, DType::F32)],
                },
            ],
        };
        let init = g.empty_nested_tuple(&sh, &ty).unwrap();
        let ExprKind::Tuple(fields) = &init.kind else {
            panic!("expected a tuple")
        };
        assert!(g.zeros.contains(&ekey(&fields[0])));
        let ExprKind::Tuple(inner) = &fields[1].kind else {
            panic!("expected a nested tuple")
        };
        assert!(g.zeros.contains(&ekey(&inner[0])));
    }

    #[test]
    fn empty_nested_tuple_rejects_opaque_shape_fields() {
        let mut g = pass();
        let sh = tuple(vec![t("weird", &[2])]);
        let ty = Ty::Tuple {
            fields: vec![Ty::tensor(1, DType::F32)],
        };
        assert!(matches!(g.empty_nested_tuple(&sh, &ty), Err(Error::Zero(_))));
    }

    #[test]
    fn rebinding_an_interned_expression_aliases_it() {
        let mut g = pass();
        g.builder.begin_region();
        let e = ops::multiply(t("a", &[2]), t("b", &[2]));
        let first = VarNode::intermediate("x_adjoint", e.ty(), e.shape());
        let second = VarNode::intermediate("y_adjoint", e.ty(), e.shape());
        g.bind_and_emit(&first, e.clone());
        g.bind_and_emit(&second, e.clone());
        let region = g.builder.end_region();
        assert_eq!(region.bindings.len(), 2);
        // the second binding is a reference to the first variable
        match &region.bindings[1].value.kind {
            ExprKind::Var(v) => assert!(Rc::ptr_eq(v, &first)),
            other => panic!("expected a variable, got {other:?}"),
        }
    }
}

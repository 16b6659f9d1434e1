use crate::{call, member, var, Binding, Expr, ExprKind, Region, Var, VarKind, VarNode};

/// Accumulates bindings for the dataflow region under construction.
///
/// Emitting a binding normalizes its value first: non-leaf sub-expressions
/// are rebound through fresh intermediate variables (`lv`, `lv1`, `lv2`, …)
/// so that every call argument and projection base is a leaf. Variable
/// references, shape literals, and tuples of leaves count as leaves.
#[derive(Default)]
pub struct BlockBuilder {
    bindings: Vec<Binding>,
    fresh: usize,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_region(&mut self) {
        self.bindings.clear();
        self.fresh = 0;
    }

    /// Emit an intermediate binding.
    pub fn emit(&mut self, var: Var, value: Expr) -> Var {
        debug_assert_eq!(var.kind, VarKind::Intermediate);
        let value = self.normalize(value);
        self.bindings.push(Binding {
            var: var.clone(),
            value,
        });
        var
    }

    /// Emit an output binding.
    pub fn emit_output(&mut self, var: Var, value: Expr) -> Var {
        debug_assert_eq!(var.kind, VarKind::Output);
        let value = self.normalize(value);
        self.bindings.push(Binding {
            var: var.clone(),
            value,
        });
        var
    }

    pub fn end_region(&mut self) -> Region {
        Region {
            bindings: std::mem::take(&mut self.bindings),
        }
    }

    /// Canonicalize `expr`, rebinding non-leaf sub-expressions through fresh
    /// intermediates. Returns the input node unchanged when it is already in
    /// normal form.
    pub fn normalize(&mut self, expr: Expr) -> Expr {
        match &expr.kind {
            ExprKind::Var(_) | ExprKind::Shape(_) | ExprKind::Seq { .. } => expr,
            ExprKind::Tuple(fields) => {
                if fields.iter().all(is_leaf) {
                    return expr;
                }
                let fields = fields.iter().map(|f| self.leaf_field(f)).collect();
                let out = crate::tuple(fields);
                restamp(&expr, &out);
                out
            }
            ExprKind::Member { tuple, index } => {
                if matches!(tuple.kind, ExprKind::Var(_)) {
                    return expr;
                }
                let base = self.rebind(tuple.clone());
                let out = member(base, *index);
                restamp(&expr, &out);
                out
            }
            ExprKind::Call { op, args, attrs } => {
                if args.iter().all(is_atom) {
                    return expr;
                }
                let args = args
                    .iter()
                    .map(|a| {
                        if is_atom(a) {
                            a.clone()
                        } else {
                            self.rebind(a.clone())
                        }
                    })
                    .collect();
                let out = call(*op, args, attrs.clone());
                restamp(&expr, &out);
                out
            }
        }
    }

    /// Tuple fields may stay inline when they are leaves or tuples of
    /// leaves; anything else is rebound.
    fn leaf_field(&mut self, field: &Expr) -> Expr {
        match &field.kind {
            ExprKind::Var(_) | ExprKind::Shape(_) => field.clone(),
            ExprKind::Tuple(_) => self.normalize(field.clone()),
            _ => self.rebind(field.clone()),
        }
    }

    /// Normalize `expr` and, unless it is already an atom, bind it to a
    /// fresh intermediate and return a reference to that variable.
    fn rebind(&mut self, expr: Expr) -> Expr {
        let expr = self.normalize(expr);
        if is_atom(&expr) {
            return expr;
        }
        let v = self.fresh_var(&expr);
        self.bindings.push(Binding {
            var: v.clone(),
            value: expr,
        });
        var(&v)
    }

    fn fresh_var(&mut self, like: &Expr) -> Var {
        let name = if self.fresh == 0 {
            "lv".to_string()
        } else {
            format!("lv{}", self.fresh)
        };
        self.fresh += 1;
        VarNode::intermediate(name, like.ty(), like.shape())
    }
}

/// Copy the stamped metadata of `from` onto `to`, keeping what `to` already
/// inferred where `from` carries nothing.
fn restamp(from: &Expr, to: &Expr) {
    if from.ty().is_some() {
        to.set_ty(from.ty());
    }
    if from.shape().is_some() {
        to.set_shape(from.shape());
    }
}

fn is_atom(e: &Expr) -> bool {
    matches!(e.kind, ExprKind::Var(_) | ExprKind::Shape(_))
}

fn is_leaf(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Var(_) | ExprKind::Shape(_) => true,
        ExprKind::Tuple(fields) => fields.iter().all(is_leaf),
        _ => false,
    }
}

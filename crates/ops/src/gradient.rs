//! The primitive gradient registry.
//!
//! For each supported operator, a function from the forward call and the
//! out-adjoint (a variable reference) to one partial-adjoint expression per
//! forward argument, in argument order. Partials of broadcasting operators
//! are wrapped in `collapse_sum_like` so that each partial has the structural
//! type of its argument.

use crate as ops;
use laurel::{Attrs, Expr, ExprKind, Op};
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

pub type GradFn = fn(&Expr, &Expr) -> Vec<Expr>;

/// An immutable lookup table from operator to primitive gradient, built once
/// and queried read-only; concurrent passes may share it.
pub struct Registry {
    map: FxHashMap<Op, GradFn>,
}

impl Registry {
    pub fn empty() -> Self {
        Registry {
            map: FxHashMap::default(),
        }
    }

    /// The table of gradients for the built-in operators.
    pub fn standard() -> Self {
        let mut r = Registry::empty();
        r.register(ops::ADD, add);
        r.register(ops::SUBTRACT, subtract);
        r.register(ops::MULTIPLY, multiply);
        r.register(ops::DIVIDE, divide);
        r.register(ops::NEGATIVE, negative);
        r.register(ops::SUM, sum);
        r.register(ops::TRANSPOSE, transpose);
        r.register(ops::MATMUL, matmul);
        r.register(ops::SOFTMAX_CROSS_ENTROPY, softmax_cross_entropy);
        r.register(ops::CONV2D, conv2d);
        r.register(ops::MAX_POOL2D, max_pool2d);
        r.register(ops::NLL_LOSS, nll_loss);
        r
    }

    pub fn register(&mut self, op: Op, f: GradFn) {
        self.map.insert(op, f);
    }

    pub fn get(&self, op: Op) -> Option<GradFn> {
        self.map.get(&op).copied()
    }
}

static STANDARD: LazyLock<Registry> = LazyLock::new(Registry::standard);

pub fn standard() -> &'static Registry {
    &STANDARD
}

fn args(call: &Expr) -> &[Expr] {
    match &call.kind {
        ExprKind::Call { args, .. } => args,
        _ => &[],
    }
}

fn attrs(call: &Expr) -> Attrs {
    match &call.kind {
        ExprKind::Call { attrs, .. } => attrs.clone(),
        _ => Attrs::None,
    }
}

fn add(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    let b = &args(call)[1];
    vec![
        ops::collapse_sum_like(adjoint.clone(), a.clone()),
        ops::collapse_sum_like(adjoint.clone(), b.clone()),
    ]
}

fn subtract(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    let b = &args(call)[1];
    vec![
        ops::collapse_sum_like(adjoint.clone(), a.clone()),
        ops::collapse_sum_like(ops::negative(adjoint.clone()), b.clone()),
    ]
}

fn multiply(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    let b = &args(call)[1];
    vec![
        ops::collapse_sum_like(ops::multiply(adjoint.clone(), b.clone()), a.clone()),
        ops::collapse_sum_like(ops::multiply(adjoint.clone(), a.clone()), b.clone()),
    ]
}

fn divide(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    let b = &args(call)[1];
    vec![
        ops::collapse_sum_like(ops::divide(adjoint.clone(), b.clone()), a.clone()),
        ops::collapse_sum_like(
            ops::negative(ops::divide(
                ops::multiply(adjoint.clone(), a.clone()),
                ops::multiply(b.clone(), b.clone()),
            )),
            b.clone(),
        ),
    ]
}

fn negative(_call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    vec![ops::negative(adjoint.clone())]
}

fn sum(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    vec![ops::multiply(adjoint.clone(), ops::ones_like(a.clone()))]
}

fn transpose(_call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    vec![ops::transpose(adjoint.clone())]
}

fn matmul(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let a = &args(call)[0];
    let b = &args(call)[1];
    vec![
        ops::collapse_sum_like(
            ops::matmul(adjoint.clone(), ops::transpose(b.clone())),
            a.clone(),
        ),
        ops::collapse_sum_like(
            ops::matmul(ops::transpose(a.clone()), adjoint.clone()),
            b.clone(),
        ),
    ]
}

fn softmax_cross_entropy(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let pred = &args(call)[0];
    let label = &args(call)[1];
    vec![
        ops::multiply(
            adjoint.clone(),
            ops::subtract(ops::softmax(pred.clone()), label.clone()),
        ),
        ops::multiply(
            adjoint.clone(),
            ops::negative(ops::log_softmax(pred.clone())),
        ),
    ]
}

fn conv2d(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let data = &args(call)[0];
    let weight = &args(call)[1];
    vec![
        ops::conv2d_backward_data(adjoint.clone(), data.clone(), weight.clone(), attrs(call)),
        ops::conv2d_backward_weight(adjoint.clone(), data.clone(), weight.clone(), attrs(call)),
    ]
}

fn max_pool2d(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let data = &args(call)[0];
    vec![ops::max_pool2d_backward(adjoint.clone(), data.clone(), attrs(call))]
}

fn nll_loss(call: &Expr, adjoint: &Expr) -> Vec<Expr> {
    let pred = &args(call)[0];
    let targets = &args(call)[1];
    vec![
        ops::nll_loss_backward_pred(adjoint.clone(), pred.clone(), targets.clone(), attrs(call)),
        // targets take no gradient; a zero fills their slot
        ops::zeros_like(targets.clone()),
    ]
}

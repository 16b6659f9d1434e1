//! Operator definitions for the laurel IR.
//!
//! Each constructor builds a call expression and stamps the result type and
//! shape it can infer, so that downstream passes and the block builder see
//! fully annotated nodes wherever the inputs were annotated.

pub mod gradient;

use laurel::{call, shape, Attrs, DType, Expr, ExprKind, Op, Reduction, Ty};

pub const ONES: Op = Op::new("ones");
pub const ZEROS: Op = Op::new("zeros");
pub const ONES_LIKE: Op = Op::new("ones_like");
pub const ZEROS_LIKE: Op = Op::new("zeros_like");

pub const ADD: Op = Op::new("add");
pub const SUBTRACT: Op = Op::new("subtract");
pub const MULTIPLY: Op = Op::new("multiply");
pub const DIVIDE: Op = Op::new("divide");
pub const NEGATIVE: Op = Op::new("negative");

pub const SUM: Op = Op::new("sum");
pub const COLLAPSE_SUM_LIKE: Op = Op::new("collapse_sum_like");
pub const TRANSPOSE: Op = Op::new("transpose");
pub const MATMUL: Op = Op::new("matmul");

pub const SOFTMAX: Op = Op::new("softmax");
pub const LOG_SOFTMAX: Op = Op::new("log_softmax");
pub const SOFTMAX_CROSS_ENTROPY: Op = Op::new("softmax_cross_entropy");

pub const CONV2D: Op = Op::new("conv2d");
pub const CONV2D_BACKWARD_DATA: Op = Op::new("conv2d_backward_data");
pub const CONV2D_BACKWARD_WEIGHT: Op = Op::new("conv2d_backward_weight");
pub const MAX_POOL2D: Op = Op::new("max_pool2d");
pub const MAX_POOL2D_BACKWARD: Op = Op::new("max_pool2d_backward");
pub const NLL_LOSS: Op = Op::new("nll_loss");
pub const NLL_LOSS_BACKWARD_PRED: Op = Op::new("nll_loss_backward_pred");

/// The concrete dimensions of `e`, when its shape is a literal.
pub fn dims(e: &Expr) -> Option<Vec<usize>> {
    let s = e.shape()?;
    match &s.kind {
        ExprKind::Shape(d) => Some(d.clone()),
        _ => None,
    }
}

pub fn dtype(e: &Expr) -> Option<DType> {
    e.ty()?.dtype()
}

/// Numpy broadcast of two shapes, right-aligned; `None` when incompatible.
pub fn broadcast(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let x = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let y = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        out[ndim - 1 - i] = if x == y || y == 1 {
            x
        } else if x == 1 {
            y
        } else {
            return None;
        };
    }
    Some(out)
}

fn stamp(e: &Expr, d: Option<Vec<usize>>, dt: Option<DType>) -> Expr {
    match d {
        Some(d) => {
            e.set_ty(Some(Ty::Tensor {
                ndim: Some(d.len()),
                dtype: dt,
            }));
            e.set_shape(Some(shape(d)));
        }
        None => e.set_ty(Some(Ty::Tensor { ndim: None, dtype: dt })),
    }
    e.clone()
}

fn stamp_like(e: &Expr, of: &Expr) -> Expr {
    e.set_ty(of.ty());
    e.set_shape(of.shape());
    e.clone()
}

fn elementwise(op: Op, a: Expr, b: Expr) -> Expr {
    let dt = dtype(&a).or_else(|| dtype(&b));
    let d = match (dims(&a), dims(&b)) {
        (Some(x), Some(y)) => broadcast(&x, &y),
        _ => None,
    };
    let c = call(op, vec![a, b], Attrs::None);
    stamp(&c, d, dt)
}

pub fn add(a: Expr, b: Expr) -> Expr {
    elementwise(ADD, a, b)
}

pub fn subtract(a: Expr, b: Expr) -> Expr {
    elementwise(SUBTRACT, a, b)
}

pub fn multiply(a: Expr, b: Expr) -> Expr {
    elementwise(MULTIPLY, a, b)
}

pub fn divide(a: Expr, b: Expr) -> Expr {
    elementwise(DIVIDE, a, b)
}

pub fn negative(a: Expr) -> Expr {
    let c = call(NEGATIVE, vec![a.clone()], Attrs::None);
    stamp_like(&c, &a)
}

pub fn ones(shape_expr: Expr, dtype: DType) -> Expr {
    init(ONES, shape_expr, dtype)
}

pub fn zeros(shape_expr: Expr, dtype: DType) -> Expr {
    init(ZEROS, shape_expr, dtype)
}

fn init(op: Op, shape_expr: Expr, dtype: DType) -> Expr {
    let ndim = match &shape_expr.kind {
        ExprKind::Shape(d) => Some(d.len()),
        _ => None,
    };
    let c = call(op, vec![shape_expr.clone()], Attrs::Init { dtype });
    c.set_ty(Some(Ty::Tensor {
        ndim,
        dtype: Some(dtype),
    }));
    c.set_shape(Some(shape_expr));
    c
}

pub fn ones_like(x: Expr) -> Expr {
    let c = call(ONES_LIKE, vec![x.clone()], Attrs::None);
    stamp_like(&c, &x)
}

pub fn zeros_like(x: Expr) -> Expr {
    let c = call(ZEROS_LIKE, vec![x.clone()], Attrs::None);
    stamp_like(&c, &x)
}

/// Full reduction to a scalar.
pub fn sum(x: Expr) -> Expr {
    let dt = dtype(&x);
    let c = call(SUM, vec![x], Attrs::None);
    stamp(&c, Some(vec![]), dt)
}

/// Sums `x` down to the shape of `like`; the reverse of broadcasting.
pub fn collapse_sum_like(x: Expr, like: Expr) -> Expr {
    let c = call(COLLAPSE_SUM_LIKE, vec![x, like.clone()], Attrs::None);
    stamp_like(&c, &like)
}

pub fn transpose(x: Expr) -> Expr {
    let dt = dtype(&x);
    let d = dims(&x).map(|mut d| {
        d.reverse();
        d
    });
    let c = call(TRANSPOSE, vec![x], Attrs::None);
    stamp(&c, d, dt)
}

pub fn matmul(a: Expr, b: Expr) -> Expr {
    let dt = dtype(&a).or_else(|| dtype(&b));
    let d = match (dims(&a), dims(&b)) {
        (Some(x), Some(y)) if x.len() >= 2 && y.len() >= 2 && x[x.len() - 1] == y[y.len() - 2] => {
            broadcast(&x[..x.len() - 2], &y[..y.len() - 2]).map(|mut lead| {
                lead.push(x[x.len() - 2]);
                lead.push(y[y.len() - 1]);
                lead
            })
        }
        _ => None,
    };
    let c = call(MATMUL, vec![a, b], Attrs::None);
    stamp(&c, d, dt)
}

pub fn softmax(x: Expr) -> Expr {
    let c = call(SOFTMAX, vec![x.clone()], Attrs::None);
    stamp_like(&c, &x)
}

pub fn log_softmax(x: Expr) -> Expr {
    let c = call(LOG_SOFTMAX, vec![x.clone()], Attrs::None);
    stamp_like(&c, &x)
}

pub fn softmax_cross_entropy(pred: Expr, label: Expr) -> Expr {
    let dt = dtype(&pred);
    let c = call(SOFTMAX_CROSS_ENTROPY, vec![pred, label], Attrs::None);
    stamp(&c, Some(vec![]), dt)
}

fn window(input: usize, kernel: usize, pad: usize, stride: usize, dilation: usize) -> usize {
    (input + 2 * pad - dilation * (kernel - 1) - 1) / stride + 1
}

/// 2-d convolution over NCHW data with OIHW weights.
pub fn conv2d(
    data: Expr,
    weight: Expr,
    strides: [usize; 2],
    padding: [usize; 2],
    dilation: [usize; 2],
    groups: usize,
) -> Expr {
    let dt = dtype(&data);
    let d = match (dims(&data), dims(&weight)) {
        (Some(d), Some(w)) if d.len() == 4 && w.len() == 4 => Some(vec![
            d[0],
            w[0],
            window(d[2], w[2], padding[0], strides[0], dilation[0]),
            window(d[3], w[3], padding[1], strides[1], dilation[1]),
        ]),
        _ => None,
    };
    let c = call(
        CONV2D,
        vec![data, weight],
        Attrs::Conv2d {
            strides,
            padding,
            dilation,
            groups,
        },
    );
    stamp(&c, d, dt)
}

pub fn conv2d_backward_data(output_grad: Expr, data: Expr, weight: Expr, attrs: Attrs) -> Expr {
    let c = call(CONV2D_BACKWARD_DATA, vec![output_grad, data.clone(), weight], attrs);
    stamp_like(&c, &data)
}

pub fn conv2d_backward_weight(output_grad: Expr, data: Expr, weight: Expr, attrs: Attrs) -> Expr {
    let c = call(CONV2D_BACKWARD_WEIGHT, vec![output_grad, data, weight.clone()], attrs);
    stamp_like(&c, &weight)
}

pub fn max_pool2d(
    data: Expr,
    pool_size: [usize; 2],
    strides: [usize; 2],
    padding: [usize; 2],
    ceil_mode: bool,
) -> Expr {
    let dt = dtype(&data);
    let d = match dims(&data) {
        Some(d) if d.len() == 4 => Some(vec![
            d[0],
            d[1],
            window(d[2], pool_size[0], padding[0], strides[0], 1),
            window(d[3], pool_size[1], padding[1], strides[1], 1),
        ]),
        _ => None,
    };
    let c = call(
        MAX_POOL2D,
        vec![data],
        Attrs::Pool2d {
            pool_size,
            strides,
            padding,
            ceil_mode,
        },
    );
    stamp(&c, d, dt)
}

pub fn max_pool2d_backward(output_grad: Expr, data: Expr, attrs: Attrs) -> Expr {
    let c = call(MAX_POOL2D_BACKWARD, vec![output_grad, data.clone()], attrs);
    stamp_like(&c, &data)
}

pub fn nll_loss(pred: Expr, targets: Expr, reduction: Reduction, ignore_index: i64) -> Expr {
    let dt = dtype(&pred);
    let d = match reduction {
        Reduction::Mean | Reduction::Sum => Some(vec![]),
        Reduction::None => dims(&targets),
    };
    let c = call(
        NLL_LOSS,
        vec![pred, targets],
        Attrs::Loss {
            reduction,
            ignore_index,
        },
    );
    stamp(&c, d, dt)
}

pub fn nll_loss_backward_pred(output_grad: Expr, pred: Expr, targets: Expr, attrs: Attrs) -> Expr {
    let c = call(NLL_LOSS_BACKWARD_PRED, vec![output_grad, pred.clone(), targets], attrs);
    stamp_like(&c, &pred)
}

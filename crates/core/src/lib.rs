pub mod builder;
mod pprint;

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A tensor element type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DType {
    Bool,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }
}

/// A structural type.
///
/// Shape values live on expression nodes, not here; a `Tensor` records only
/// what is known about its rank and element type.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Ty {
    Tensor {
        ndim: Option<usize>,
        dtype: Option<DType>,
    },
    Tuple {
        fields: Vec<Ty>,
    },
    Shape,
    Prim {
        dtype: DType,
    },
}

impl Ty {
    pub fn tensor(ndim: usize, dtype: DType) -> Self {
        Ty::Tensor {
            ndim: Some(ndim),
            dtype: Some(dtype),
        }
    }

    /// The type of a zero-dimensional tensor.
    pub fn scalar(dtype: DType) -> Self {
        Self::tensor(0, dtype)
    }

    pub fn dtype(&self) -> Option<DType> {
        match self {
            Ty::Tensor { dtype, .. } => *dtype,
            &Ty::Prim { dtype } => Some(dtype),
            _ => None,
        }
    }

    /// A tensor, or a tuple all of whose fields are nested tensors. Only
    /// nested-tensor-typed values admit adjoints.
    pub fn is_nested_tensor(&self) -> bool {
        match self {
            Ty::Tensor { .. } => true,
            Ty::Tuple { fields } => fields.iter().all(Ty::is_nested_tensor),
            _ => false,
        }
    }

    pub fn is_scalar_tensor(&self) -> bool {
        matches!(self, Ty::Tensor { ndim: Some(0), .. })
    }
}

/// Whether a variable is scoped to its dataflow region or escapes it.
/// Function parameters are `Output`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VarKind {
    Intermediate,
    Output,
}

/// An IR identifier. Identity is the `Rc` allocation; two variables with the
/// same name are distinct unless they are the same node.
#[derive(Debug)]
pub struct VarNode {
    pub name: String,
    pub kind: VarKind,
    pub ty: Option<Ty>,
    pub shape: Option<Expr>,
}

pub type Var = Rc<VarNode>;

impl VarNode {
    pub fn new(name: impl Into<String>, kind: VarKind, ty: Option<Ty>, shape: Option<Expr>) -> Var {
        Rc::new(VarNode {
            name: name.into(),
            kind,
            ty,
            shape,
        })
    }

    pub fn intermediate(name: impl Into<String>, ty: Option<Ty>, shape: Option<Expr>) -> Var {
        Self::new(name, VarKind::Intermediate, ty, shape)
    }

    pub fn output(name: impl Into<String>, ty: Option<Ty>, shape: Option<Expr>) -> Var {
        Self::new(name, VarKind::Output, ty, shape)
    }
}

/// An operator handle. Operators are defined by name; equality is by name.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Op {
    pub name: &'static str,
}

impl Op {
    pub const fn new(name: &'static str) -> Self {
        Op { name }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reduction {
    None,
    Mean,
    Sum,
}

/// Attribute payload of an operator call.
#[derive(Clone, Debug, PartialEq)]
pub enum Attrs {
    None,
    Init {
        dtype: DType,
    },
    Conv2d {
        strides: [usize; 2],
        padding: [usize; 2],
        dilation: [usize; 2],
        groups: usize,
    },
    Pool2d {
        pool_size: [usize; 2],
        strides: [usize; 2],
        padding: [usize; 2],
        ceil_mode: bool,
    },
    Loss {
        reduction: Reduction,
        ignore_index: i64,
    },
}

#[derive(Debug)]
pub enum ExprKind {
    Var(Var),
    /// A concrete shape literal.
    Shape(Vec<usize>),
    Tuple(Vec<Expr>),
    /// Projection of one field out of a tuple-typed expression.
    Member {
        tuple: Expr,
        index: usize,
    },
    Call {
        op: Op,
        args: Vec<Expr>,
        attrs: Attrs,
    },
    /// Sequenced dataflow regions terminated by a result expression.
    Seq {
        regions: Vec<Region>,
        result: Expr,
    },
}

/// An expression node. Type and shape are stamped after construction: calls
/// are stamped by their operator constructors, and the AD pass re-stamps an
/// adjoint expression with its binding variable's metadata on emission.
#[derive(Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    ty: RefCell<Option<Ty>>,
    shape: RefCell<Option<Expr>>,
}

pub type Expr = Rc<ExprNode>;

impl ExprNode {
    fn with(kind: ExprKind, ty: Option<Ty>, shape: Option<Expr>) -> Expr {
        Rc::new(ExprNode {
            kind,
            ty: RefCell::new(ty),
            shape: RefCell::new(shape),
        })
    }

    pub fn ty(&self) -> Option<Ty> {
        self.ty.borrow().clone()
    }

    pub fn shape(&self) -> Option<Expr> {
        self.shape.borrow().clone()
    }

    pub fn set_ty(&self, ty: Option<Ty>) {
        *self.ty.borrow_mut() = ty;
    }

    pub fn set_shape(&self, shape: Option<Expr>) {
        *self.shape.borrow_mut() = shape;
    }
}

/// A reference to `v`, carrying its type and shape.
pub fn var(v: &Var) -> Expr {
    ExprNode::with(ExprKind::Var(v.clone()), v.ty.clone(), v.shape.clone())
}

pub fn shape(dims: Vec<usize>) -> Expr {
    ExprNode::with(ExprKind::Shape(dims), Some(Ty::Shape), None)
}

/// A tuple literal. Its type and shape are the tuples of its fields' types
/// and shapes, when all of them are known.
pub fn tuple(fields: Vec<Expr>) -> Expr {
    let ty = fields
        .iter()
        .map(|f| f.ty())
        .collect::<Option<Vec<_>>>()
        .map(|fields| Ty::Tuple { fields });
    let shapes = fields.iter().map(|f| f.shape()).collect::<Option<Vec<_>>>();
    let shape = shapes.map(|s| ExprNode::with(ExprKind::Tuple(s), None, None));
    ExprNode::with(ExprKind::Tuple(fields), ty, shape)
}

pub fn member(tuple: Expr, index: usize) -> Expr {
    let ty = match tuple.ty() {
        Some(Ty::Tuple { fields }) => fields.into_iter().nth(index),
        _ => None,
    };
    let shape = tuple.shape().and_then(|s| match &s.kind {
        ExprKind::Tuple(fields) => fields.get(index).cloned(),
        _ => None,
    });
    ExprNode::with(ExprKind::Member { tuple, index }, ty, shape)
}

/// An operator call, unstamped; operator constructors stamp what they infer.
pub fn call(op: Op, args: Vec<Expr>, attrs: Attrs) -> Expr {
    ExprNode::with(ExprKind::Call { op, args, attrs }, None, None)
}

pub fn seq(regions: Vec<Region>, result: Expr) -> Expr {
    let ty = result.ty();
    let shape = result.shape();
    ExprNode::with(ExprKind::Seq { regions, result }, ty, shape)
}

/// Associates a variable with the expression computing it. Whether this is an
/// intermediate or an output binding follows the variable's kind.
#[derive(Clone, Debug)]
pub struct Binding {
    pub var: Var,
    pub value: Expr,
}

/// A linear sequence of bindings; free of control flow.
#[derive(Clone, Debug, Default)]
pub struct Region {
    pub bindings: Vec<Binding>,
}

#[derive(Debug)]
pub struct Function {
    pub params: Vec<Var>,
    /// A `Seq` expression.
    pub body: Expr,
    pub ret_ty: Option<Ty>,
    pub global_symbol: Option<String>,
}

/// A named collection of functions. Cloning is cheap (functions are shared),
/// so a pass extends a clone and leaves its input untouched.
#[derive(Clone, Debug, Default)]
pub struct Module {
    functions: IndexMap<String, Rc<Function>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, function: Function) {
        self.functions.insert(name.into(), Rc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Function>> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&str, &Rc<Function>)> {
        self.functions.iter().map(|(name, f)| (name.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

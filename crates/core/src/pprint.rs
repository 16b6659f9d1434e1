use crate::{Attrs, Binding, DType, ExprKind, Function, Module, Region, Ty, Var, VarKind};
use std::fmt;

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Tensor { ndim, dtype } => {
                write!(f, "Tensor(")?;
                match ndim {
                    Some(n) => write!(f, "ndim={n}")?,
                    None => write!(f, "ndim=?")?,
                }
                match dtype {
                    Some(d) => write!(f, ", {d})"),
                    None => write!(f, ", ?)"),
                }
            }
            Ty::Tuple { fields } => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
            Ty::Shape => write!(f, "Shape"),
            Ty::Prim { dtype } => write!(f, "Prim({dtype})"),
        }
    }
}

impl fmt::Display for crate::ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Var(v) => f.write_str(&v.name),
            ExprKind::Shape(dims) => {
                write!(f, "(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{d}")?;
                }
                if dims.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            ExprKind::Tuple(fields) => {
                write!(f, "(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field}")?;
                }
                write!(f, ")")
            }
            ExprKind::Member { tuple, index } => write!(f, "{tuple}.{index}"),
            ExprKind::Call { op, args, attrs } => {
                write!(f, "{}(", op.name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                if let Attrs::Init { dtype } = attrs {
                    if !args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{dtype}")?;
                }
                write!(f, ")")
            }
            ExprKind::Seq { regions, result } => {
                writeln!(f, "{{")?;
                for region in regions {
                    write!(f, "{region}")?;
                }
                writeln!(f, "  return {result}")?;
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.var.kind == VarKind::Output {
            write!(f, "output ")?;
        }
        write!(f, "{} = {}", self.var.name, self.value)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for binding in &self.bindings {
            writeln!(f, "  {binding}")?;
        }
        Ok(())
    }
}

fn write_annotated(f: &mut fmt::Formatter<'_>, v: &Var) -> fmt::Result {
    write!(f, "{}: ", v.name)?;
    match (&v.ty, &v.shape) {
        (Some(Ty::Tensor { dtype, .. }), Some(shape)) => {
            write!(f, "Tensor({shape}, ")?;
            match dtype {
                Some(d) => write!(f, "{d})"),
                None => write!(f, "?)"),
            }
        }
        (Some(ty), _) => write!(f, "{ty}"),
        (None, _) => write!(f, "?"),
    }
}

impl Function {
    fn fmt_signature(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_annotated(f, param)?;
        }
        write!(f, ")")?;
        if let Some(ret) = &self.ret_ty {
            write!(f, " -> {ret}")?;
        }
        write!(f, " {}", self.body)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn")?;
        self.fmt_signature(f)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, function) in self.functions() {
            write!(f, "fn {name}")?;
            function.fmt_signature(f)?;
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{call, member, seq, shape, tuple, var, Attrs, Binding, DType, Op, Region, Ty, VarNode};

    #[test]
    fn exprs_print_inline() {
        let x = VarNode::output("x", Some(Ty::tensor(2, DType::F32)), Some(shape(vec![5, 5])));
        let t = tuple(vec![var(&x), var(&x)]);
        assert_eq!(t.to_string(), "(x, x)");
        assert_eq!(member(t, 0).to_string(), "(x, x).0");
        let z = call(Op::new("zeros"), vec![shape(vec![5, 5])], Attrs::Init { dtype: DType::F32 });
        assert_eq!(z.to_string(), "zeros((5, 5), f32)");
        assert_eq!(shape(vec![]).to_string(), "()");
        assert_eq!(shape(vec![3]).to_string(), "(3,)");
    }

    #[test]
    fn bindings_mark_outputs() {
        let x = VarNode::output("x", Some(Ty::scalar(DType::F32)), Some(shape(vec![])));
        let b = Binding {
            var: x.clone(),
            value: call(Op::new("ones"), vec![shape(vec![])], Attrs::Init { dtype: DType::F32 }),
        };
        assert_eq!(b.to_string(), "output x = ones((), f32)");
        let body = seq(
            vec![Region { bindings: vec![b] }],
            var(&x),
        );
        assert_eq!(body.to_string(), "{\n  output x = ones((), f32)\n  return x\n}");
    }
}

use crate::{
    ast::{BinaryOp, Expr},
    bounds,
    codegen::{
        ir::{IrType, Value},
        runtime, Generator, Typed,
    },
    error::{semantic, Result},
    stdlib::Builtin,
    token::Position,
    types::VarType,
};

fn name(builtin: Builtin) -> &'static str {
    match builtin {
        Builtin::Print => "print",
        Builtin::Println => "println",
        Builtin::Readln => "readln",
        Builtin::ReadInt => "read_int",
        Builtin::Dec => "@dec",
        Builtin::Bin => "@bin",
        Builtin::Sqrt => "sqrt",
        Builtin::Pow => "pow",
        Builtin::Abs => "abs",
        Builtin::Min => "min",
        Builtin::Max => "max",
        Builtin::Floor => "floor",
        Builtin::Ceil => "ceil",
    }
}

impl Generator<'_> {
    /// Emits a call to a standard library function whose arity has already
    /// been checked.
    pub(super) fn gen_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        pos: Position,
    ) -> Result<Typed> {
        match (builtin, args) {
            (Builtin::Print | Builtin::Println, [arg]) => {
                let value = self.gen_expr(arg, None)?;
                let text = self.to_text(value, arg.pos)?;
                let helper = if builtin == Builtin::Print {
                    &runtime::PRINT
                } else {
                    &runtime::PRINTLN
                };
                self.call_helper(helper, IrType::Void, &[text]);
                Ok(Typed::void())
            }
            (Builtin::Readln, []) => {
                let line = self.call_helper(&runtime::READLN, IrType::Ptr, &[]);
                Ok(Typed::new(line, VarType::String))
            }
            (Builtin::ReadInt, []) => {
                let value = self.call_helper(&runtime::READ_INT, IrType::Int(64), &[]);
                Ok(Typed::new(value, VarType::Int64))
            }
            (Builtin::Dec, [arg]) => {
                let value = self.integer_arg(builtin, arg)?;
                let text = self.to_text(value, arg.pos)?;
                Ok(Typed::new(text, VarType::String))
            }
            (Builtin::Bin, [arg]) => {
                let value = self.integer_arg(builtin, arg)?;
                let width = value.ty.bits().unwrap_or(1).max(1);
                let wide = self.widen(value.value, false);
                let text = self.call_helper(
                    &runtime::BIN,
                    IrType::Ptr,
                    &[wide, Value::int(64, width)],
                );
                Ok(Typed::new(text, VarType::String))
            }
            (Builtin::Sqrt | Builtin::Floor | Builtin::Ceil, [arg]) => {
                let x = self.double_arg(builtin, arg)?;
                Ok(self.call_libm(name(builtin), &[x]))
            }
            (Builtin::Pow, [base, exponent]) => {
                let base = self.double_arg(builtin, base)?;
                let exponent = self.double_arg(builtin, exponent)?;
                Ok(self.call_libm("pow", &[base, exponent]))
            }
            (Builtin::Abs, [arg]) => self.gen_abs(arg),
            (Builtin::Min | Builtin::Max, [a, b]) => self.gen_min_max(builtin, a, b),
            _ => semantic!(
                pos,
                "wrong number of arguments for `{}`: got {}",
                name(builtin),
                args.len()
            ),
        }
    }

    fn integer_arg(&mut self, builtin: Builtin, arg: &Expr) -> Result<Typed> {
        let value = self.gen_expr(arg, None)?;
        if !bounds::is_integer(value.ty) && value.ty != VarType::Bool {
            return semantic!(
                arg.pos,
                "`{}` expects an integer argument, found {}",
                name(builtin),
                value.label()
            );
        }
        Ok(value)
    }

    fn double_arg(&mut self, builtin: Builtin, arg: &Expr) -> Result<Value> {
        let value = self.gen_expr(arg, Some(VarType::Float64))?;
        if !bounds::is_numeric(value.ty) {
            return semantic!(
                arg.pos,
                "`{}` expects a numeric argument, found {}",
                name(builtin),
                value.label()
            );
        }
        self.coerce(value, VarType::Float64, None, arg.pos)
    }

    fn call_libm(&mut self, function: &str, args: &[Value]) -> Typed {
        let params = vec!["double"; args.len()].join(", ");
        self.module
            .declare(&format!("declare double @{function}({params})"));
        let args = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let value = self
            .func
            .assign(IrType::Double, format_args!("call double @{function}({args})"));
        Typed::new(value, VarType::Float64)
    }

    fn gen_abs(&mut self, arg: &Expr) -> Result<Typed> {
        let value = self.gen_expr(arg, None)?;
        let ir = value.value.ty.clone();
        match value.ty {
            ty if bounds::is_float(ty) => {
                let function = if ir == IrType::Float { "fabsf" } else { "fabs" };
                self.module
                    .declare(&format!("declare {ir} @{function}({ir})"));
                let result = self
                    .func
                    .assign(ir.clone(), format_args!("call {ir} @{function}({})", value.value));
                Ok(Typed::new(result, ty))
            }
            ty if bounds::is_signed(ty) => {
                let negated = self
                    .func
                    .assign(ir.clone(), format_args!("sub {ir} 0, {}", value.value.repr));
                let negative = self
                    .func
                    .assign(IrType::BOOL, format_args!("icmp slt {}, 0", value.value));
                let result = self.func.assign(
                    ir,
                    format_args!("select i1 {}, {negated}, {}", negative.repr, value.value),
                );
                Ok(Typed::new(result, ty))
            }
            ty if bounds::is_unsigned(ty) => Ok(value),
            _ => semantic!(
                arg.pos,
                "`abs` expects a numeric argument, found {}",
                value.label()
            ),
        }
    }

    fn gen_min_max(&mut self, builtin: Builtin, a: &Expr, b: &Expr) -> Result<Typed> {
        let (l, r) = self.gen_operands(a, b)?;
        for operand in [&l, &r] {
            if !bounds::is_numeric(operand.ty) {
                return semantic!(
                    a.pos,
                    "`{}` expects numeric arguments, found {}",
                    name(builtin),
                    operand.label()
                );
            }
        }
        let ty = bounds::promote(l.ty, r.ty);
        let l = self.coerce(l, ty, None, a.pos)?;
        let r = self.coerce(r, ty, None, b.pos)?;
        let op = if builtin == Builtin::Min {
            BinaryOp::Less
        } else {
            BinaryOp::Greater
        };
        let pick_left = self.compare(op, ty, &l, &r);
        let result = self.func.assign(
            l.ty.clone(),
            format_args!("select i1 {}, {l}, {r}", pick_left.repr),
        );
        Ok(Typed::new(result, ty))
    }
}

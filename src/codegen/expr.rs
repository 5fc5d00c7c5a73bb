use std::collections::HashSet;

use crate::{
    ast::{BinaryOp, Callee, Expr, ExprKind, Param, UnaryOp},
    bigint::BigInt,
    bounds,
    codegen::{
        ir::{IrType, Value},
        runtime::{self, Helper},
        storage_type, type_label, Generator, Signature, Typed,
    },
    error::{semantic, Result},
    stdlib::{self, Member},
    token::Position,
    types::VarType,
};

/// The value of an integer literal, looking through negation.
pub(super) fn int_literal(expr: &Expr) -> Option<BigInt> {
    match &expr.kind {
        ExprKind::Int(value) => Some(value.clone()),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            expr,
        } => int_literal(expr).map(|v| -v),
        _ => None,
    }
}

/// The value of a float literal, looking through negation.
pub(super) fn float_literal(expr: &Expr) -> Option<f64> {
    match &expr.kind {
        ExprKind::Float { value, .. } => Some(*value),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            expr,
        } => float_literal(expr).map(|v| -v),
        _ => None,
    }
}

fn is_numeric_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Int(_) | ExprKind::Float { .. } => true,
        ExprKind::Unary {
            op: UnaryOp::Neg,
            expr,
        } => is_numeric_literal(expr),
        _ => false,
    }
}

/// Whether `+` on this operand means concatenation.
fn is_text(value: &Typed) -> bool {
    value.ty == VarType::String && value.value.ty == IrType::Ptr
}

fn int_bits(ty: VarType) -> u32 {
    match storage_type(ty, None) {
        IrType::Int(bits) => bits,
        _ => 32,
    }
}

fn int_instruction(op: BinaryOp, signed: bool) -> Option<&'static str> {
    let instruction = match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div if signed => "sdiv",
        BinaryOp::Div => "udiv",
        BinaryOp::Mod if signed => "srem",
        BinaryOp::Mod => "urem",
        BinaryOp::BitAnd => "and",
        BinaryOp::BitOr => "or",
        BinaryOp::BitXor => "xor",
        BinaryOp::Shl => "shl",
        BinaryOp::Shr if signed => "ashr",
        BinaryOp::Shr => "lshr",
        _ => return None,
    };
    Some(instruction)
}

fn float_instruction(op: BinaryOp) -> Option<&'static str> {
    let instruction = match op {
        BinaryOp::Add => "fadd",
        BinaryOp::Sub => "fsub",
        BinaryOp::Mul => "fmul",
        BinaryOp::Div => "fdiv",
        BinaryOp::Mod => "frem",
        _ => return None,
    };
    Some(instruction)
}

impl Generator<'_> {
    /// Generates `expr`. `hint` is the type the surrounding context expects,
    /// which untyped numeric literals adopt when they fit.
    pub(super) fn gen_expr(&mut self, expr: &Expr, hint: Option<VarType>) -> Result<Typed> {
        if let Some(value) = int_literal(expr) {
            return self.gen_int_literal(&value, hint, expr.pos);
        }
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Int(value) => self.gen_int_literal(value, hint, pos),
            ExprKind::Float { value, ty } => {
                let ty = match hint {
                    Some(hint) if bounds::is_float(hint) => hint,
                    _ => *ty,
                };
                Ok(Typed::new(Value::float(storage_type(ty, None), *value), ty))
            }
            ExprKind::String(text) => {
                let value = self.module.string_constant(text);
                Ok(Typed::new(value, VarType::String))
            }
            ExprKind::Bool(value) => Ok(Typed::new(Value::bool(*value), VarType::Bool)),
            ExprKind::Format { segments, args } => self.gen_format(segments, args),
            ExprKind::Variable(name) => self.gen_variable(name, pos),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs, pos),
            ExprKind::Unary { op, expr } => self.gen_unary(*op, expr, hint, pos),
            ExprKind::Call { callee, args } => self.gen_call(callee, args, pos),
            ExprKind::Cast { expr, ty } => self.gen_cast(expr, *ty, pos),
            ExprKind::Module(path) => Ok(Typed::named(
                Value::new(IrType::Ptr, "null"),
                VarType::Module,
                path.clone(),
            )),
            ExprKind::Member { object, member } => self.gen_member(object, member, pos),
            ExprKind::EnumValue { enum_name, member } => {
                let Some(&value) = self.enums.get(enum_name).and_then(|m| m.get(member)) else {
                    return semantic!(pos, "unknown enum member `{enum_name}.{member}`");
                };
                Ok(Typed::new(Value::int(32, value), VarType::Int32))
            }
            ExprKind::StructLiteral { name, fields } => self.gen_struct_literal(name, fields, pos),
        }
    }

    /// Generates `expr` and converts it to `ty`. Integer literals are checked
    /// against the range of `ty` first.
    pub(super) fn gen_expr_as(
        &mut self,
        expr: &Expr,
        ty: VarType,
        type_name: Option<&str>,
    ) -> Result<Value> {
        if let Some(value) = int_literal(expr) {
            if bounds::bounds(ty).is_some() && !bounds::check_bounds(ty, &value) {
                return semantic!(expr.pos, "{}", bounds::out_of_bounds_message(ty, &value));
            }
        }
        let typed = self.gen_expr(expr, Some(ty))?;
        self.convert(typed, ty, type_name, expr.pos)
    }

    fn gen_int_literal(
        &mut self,
        value: &BigInt,
        hint: Option<VarType>,
        pos: Position,
    ) -> Result<Typed> {
        let ty = match hint {
            Some(hint) if bounds::is_float(hint) => {
                let float = value.to_string().parse::<f64>().unwrap_or_default();
                let value = Value::float(storage_type(hint, None), float);
                return Ok(Typed::new(value, hint));
            }
            Some(hint) if bounds::is_integer(hint) && bounds::check_bounds(hint, value) => hint,
            _ => {
                if let Err(e) = value.to_i64() {
                    return semantic!(pos, "{e}");
                }
                if bounds::check_bounds(VarType::Int32, value) {
                    VarType::Int32
                } else {
                    VarType::Int64
                }
            }
        };
        Ok(Typed::new(Value::int(int_bits(ty), value), ty))
    }

    fn gen_variable(&mut self, name: &str, pos: Position) -> Result<Typed> {
        if let Some(binding) = self.lookup(name).cloned() {
            if binding.ty == VarType::Struct {
                let value = Value::new(IrType::Ptr, binding.ptr);
                let type_name = binding.type_name.unwrap_or_default();
                return Ok(Typed::named(value, VarType::Struct, type_name));
            }
            let ty = storage_type(binding.ty, None);
            let value = self
                .func
                .assign(ty.clone(), format_args!("load {ty}, ptr {}", binding.ptr));
            return Ok(Typed::new(value, binding.ty));
        }
        if let Some(path) = self.lookup_alias(name) {
            let path = path.to_owned();
            let value = Value::new(IrType::Ptr, "null");
            return Ok(Typed::named(value, VarType::Module, path));
        }
        semantic!(pos, "unknown variable `{name}`")
    }

    /// Generates both operands of a binary operator. A numeric literal on one
    /// side is generated last, typed after the other side.
    pub(super) fn gen_operands(&mut self, lhs: &Expr, rhs: &Expr) -> Result<(Typed, Typed)> {
        match (is_numeric_literal(lhs), is_numeric_literal(rhs)) {
            (true, false) => {
                let r = self.gen_expr(rhs, None)?;
                let l = self.gen_expr(lhs, Some(r.ty))?;
                Ok((l, r))
            }
            (false, true) => {
                let l = self.gen_expr(lhs, None)?;
                let r = self.gen_expr(rhs, Some(l.ty))?;
                Ok((l, r))
            }
            _ => Ok((self.gen_expr(lhs, None)?, self.gen_expr(rhs, None)?)),
        }
    }

    fn gen_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, pos: Position) -> Result<Typed> {
        if op.is_logical() {
            return self.gen_logical(op, lhs, rhs);
        }
        let (l, r) = self.gen_operands(lhs, rhs)?;
        if is_text(&l) || is_text(&r) {
            return self.gen_text_binary(op, l, r, pos);
        }

        let arithmetic = |t: &Typed| bounds::is_numeric(t.ty) || t.ty == VarType::Bool;
        if !arithmetic(&l) || !arithmetic(&r) {
            return semantic!(
                pos,
                "operator `{}` cannot be applied to {} and {}",
                op.symbol(),
                l.label(),
                r.label()
            );
        }
        // Division, remainder and right shift follow the left operand.
        let signed = bounds::is_signed(l.ty);
        let ty = bounds::promote(l.ty, r.ty);
        let a = self.coerce(l, ty, None, pos)?;
        let b = self.coerce(r, ty, None, pos)?;

        if op.is_comparison() {
            let value = self.compare(op, ty, &a, &b);
            return Ok(Typed::new(value, VarType::Bool));
        }

        let ir = storage_type(ty, None);
        if ir.is_float() && op.is_bitwise() {
            return self.float_bitwise(op, ty, &a, &b, pos);
        }
        let instruction = if ir.is_float() {
            float_instruction(op)
        } else {
            int_instruction(op, signed)
        };
        let Some(instruction) = instruction else {
            return semantic!(pos, "operator `{}` cannot be applied to {ty}", op.symbol());
        };
        let value = self
            .func
            .assign(ir, format_args!("{instruction} {a}, {}", b.repr));
        Ok(Typed::new(value, ty))
    }

    /// Bitwise operators on floats go through `int64` and back.
    fn float_bitwise(
        &mut self,
        op: BinaryOp,
        ty: VarType,
        a: &Value,
        b: &Value,
        pos: Position,
    ) -> Result<Typed> {
        let Some(instruction) = int_instruction(op, true) else {
            return semantic!(pos, "operator `{}` cannot be applied to {ty}", op.symbol());
        };
        let i64 = IrType::Int(64);
        let a = self.func.assign(i64.clone(), format_args!("fptosi {a} to i64"));
        let b = self.func.assign(i64.clone(), format_args!("fptosi {b} to i64"));
        let result = self
            .func
            .assign(i64, format_args!("{instruction} {a}, {}", b.repr));
        let ir = storage_type(ty, None);
        let value = self
            .func
            .assign(ir.clone(), format_args!("sitofp {result} to {ir}"));
        Ok(Typed::new(value, ty))
    }

    pub(super) fn compare(&mut self, op: BinaryOp, ty: VarType, a: &Value, b: &Value) -> Value {
        let instruction = if bounds::is_float(ty) {
            let predicate = match op {
                BinaryOp::Eq => "oeq",
                BinaryOp::NotEq => "one",
                BinaryOp::Less => "olt",
                BinaryOp::Greater => "ogt",
                BinaryOp::LessEq => "ole",
                _ => "oge",
            };
            format!("fcmp {predicate}")
        } else {
            let signed = bounds::is_signed(ty);
            let predicate = match op {
                BinaryOp::Eq => "eq",
                BinaryOp::NotEq => "ne",
                BinaryOp::Less if signed => "slt",
                BinaryOp::Less => "ult",
                BinaryOp::Greater if signed => "sgt",
                BinaryOp::Greater => "ugt",
                BinaryOp::LessEq if signed => "sle",
                BinaryOp::LessEq => "ule",
                _ if signed => "sge",
                _ => "uge",
            };
            format!("icmp {predicate}")
        };
        self.func
            .assign(IrType::BOOL, format_args!("{instruction} {a}, {}", b.repr))
    }

    fn gen_text_binary(&mut self, op: BinaryOp, l: Typed, r: Typed, pos: Position) -> Result<Typed> {
        match op {
            BinaryOp::Add => {
                let a = self.to_text(l, pos)?;
                let b = self.to_text(r, pos)?;
                let value = self.call_helper(&runtime::CONCAT, IrType::Ptr, &[a, b]);
                Ok(Typed::new(value, VarType::String))
            }
            BinaryOp::Eq | BinaryOp::NotEq if is_text(&l) && is_text(&r) => {
                self.module.declare("declare i32 @strcmp(ptr, ptr)");
                let order = self.func.assign(
                    IrType::Int(32),
                    format_args!("call i32 @strcmp({}, {})", l.value, r.value),
                );
                let predicate = if op == BinaryOp::Eq { "eq" } else { "ne" };
                let value = self
                    .func
                    .assign(IrType::BOOL, format_args!("icmp {predicate} {order}, 0"));
                Ok(Typed::new(value, VarType::Bool))
            }
            _ => semantic!(
                pos,
                "operator `{}` cannot be applied to {} and {}",
                op.symbol(),
                l.label(),
                r.label()
            ),
        }
    }

    /// `&&` and `||` only evaluate their right operand when needed.
    fn gen_logical(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Typed> {
        let l = self.gen_expr(lhs, None)?;
        let l = self.to_condition(&l, lhs.pos)?;
        let from = self.func.current_block();
        let (prefix, short) = if op == BinaryOp::And {
            ("and", "false")
        } else {
            ("or", "true")
        };
        let rhs_bb = self.func.new_block(&format!("{prefix}.rhs"));
        let end_bb = self.func.new_block(&format!("{prefix}.end"));
        if op == BinaryOp::And {
            self.func.cond_br(&l, rhs_bb, end_bb);
        } else {
            self.func.cond_br(&l, end_bb, rhs_bb);
        }

        self.func.position_at(rhs_bb);
        let r = self.gen_expr(rhs, None)?;
        let r = self.to_condition(&r, rhs.pos)?;
        let rhs_end = self.func.current_block();
        self.func.br(end_bb);

        self.func.position_at(end_bb);
        let from = self.func.label(from).to_owned();
        let rhs_end = self.func.label(rhs_end).to_owned();
        let value = self.func.assign(
            IrType::BOOL,
            format_args!("phi i1 [ {short}, %{from} ], [ {r}, %{rhs_end} ]"),
        );
        Ok(Typed::new(value, VarType::Bool))
    }

    fn gen_unary(
        &mut self,
        op: UnaryOp,
        expr: &Expr,
        hint: Option<VarType>,
        pos: Position,
    ) -> Result<Typed> {
        match op {
            UnaryOp::Not => {
                let value = self.gen_expr(expr, None)?;
                let cond = self.to_condition(&value, expr.pos)?;
                let value = self
                    .func
                    .assign(IrType::BOOL, format_args!("xor i1 {cond}, true"));
                Ok(Typed::new(value, VarType::Bool))
            }
            UnaryOp::Neg => {
                let value = self.gen_expr(expr, hint.filter(|h| bounds::is_numeric(*h)))?;
                let ir = value.value.ty.clone();
                let negated = match &ir {
                    IrType::Float | IrType::Double => format!("fneg {}", value.value),
                    IrType::Int(_) if bounds::is_numeric(value.ty) => {
                        format!("sub {ir} 0, {}", value.value.repr)
                    }
                    _ => {
                        return semantic!(
                            pos,
                            "operator `-` cannot be applied to {}",
                            value.label()
                        )
                    }
                };
                let result = self.func.assign(ir, negated);
                Ok(Typed::new(result, value.ty))
            }
            UnaryOp::BitNot => {
                let value = self.gen_expr(expr, None)?;
                if bounds::is_integer(value.ty) {
                    let result = self
                        .func
                        .assign(value.value.ty.clone(), format_args!("xor {}, -1", value.value));
                    return Ok(Typed::new(result, value.ty));
                }
                if bounds::is_float(value.ty) {
                    let all_ones = Value::float(value.value.ty.clone(), -1.0);
                    return self.float_bitwise(BinaryOp::BitXor, value.ty, &value.value, &all_ones, pos);
                }
                semantic!(pos, "operator `~` cannot be applied to {}", value.label())
            }
        }
    }

    fn gen_cast(&mut self, expr: &Expr, ty: VarType, pos: Position) -> Result<Typed> {
        let value = self.gen_expr(expr, None)?;
        if !bounds::can_cast(value.ty, ty) {
            return semantic!(pos, "cannot cast {} to {ty}", value.label());
        }
        if value.ty == ty {
            return Ok(value);
        }
        let value = self.coerce(value, ty, None, pos)?;
        Ok(Typed::new(value, ty))
    }

    /// An implicit conversion, as done for initializers, assignments,
    /// arguments and returns.
    fn convert(
        &mut self,
        value: Typed,
        ty: VarType,
        type_name: Option<&str>,
        pos: Position,
    ) -> Result<Value> {
        let same_name = ty != VarType::Struct || value.type_name.as_deref() == type_name;
        if value.ty == ty && same_name {
            return Ok(value.value);
        }
        if value.ty == ty || !bounds::can_cast(value.ty, ty) {
            return semantic!(
                pos,
                "type mismatch: expected {}, found {}",
                type_label(ty, type_name),
                value.label()
            );
        }
        self.coerce(value, ty, type_name, pos)
    }

    /// Changes the representation of `value` to the storage type of `ty`.
    /// Legality is up to the caller.
    pub(super) fn coerce(
        &mut self,
        value: Typed,
        ty: VarType,
        type_name: Option<&str>,
        pos: Position,
    ) -> Result<Value> {
        if ty == VarType::String {
            return self.to_text(value, pos);
        }
        let target = storage_type(ty, type_name);
        let signed = bounds::is_signed(value.ty);
        let label = value.label();
        let value = value.value;
        let instruction = match (&value.ty, &target) {
            (from, to) if from == to => return Ok(value),
            (IrType::Int(_), IrType::Int(1)) => format!("icmp ne {value}, 0"),
            (IrType::Int(from), IrType::Int(to)) if from < to => {
                let op = if signed { "sext" } else { "zext" };
                format!("{op} {value} to {target}")
            }
            (IrType::Int(_), IrType::Int(_)) => format!("trunc {value} to {target}"),
            (IrType::Int(_), to) if to.is_float() => {
                let op = if signed { "sitofp" } else { "uitofp" };
                format!("{op} {value} to {target}")
            }
            (from, IrType::Int(1)) if from.is_float() => format!("fcmp une {value}, 0.0"),
            (from, IrType::Int(_)) if from.is_float() => {
                let op = if bounds::is_unsigned(ty) { "fptoui" } else { "fptosi" };
                format!("{op} {value} to {target}")
            }
            (IrType::Float, IrType::Double) => format!("fpext {value} to double"),
            (IrType::Double, IrType::Float) => format!("fptrunc {value} to float"),
            _ => return semantic!(pos, "cannot cast {label} to {}", type_label(ty, type_name)),
        };
        Ok(self.func.assign(target, instruction))
    }

    /// Renders a scalar as a string through the runtime helpers.
    pub(super) fn to_text(&mut self, value: Typed, pos: Position) -> Result<Value> {
        let text = match value.ty {
            VarType::String => return Ok(value.value),
            VarType::Bool | VarType::Uint0 => {
                self.call_helper(&runtime::BOOL_TO_STR, IrType::Ptr, &[value.value])
            }
            ty if bounds::is_signed(ty) => {
                let wide = self.widen(value.value, true);
                self.call_helper(&runtime::I64_TO_STR, IrType::Ptr, &[wide])
            }
            ty if bounds::is_unsigned(ty) => {
                let wide = self.widen(value.value, false);
                self.call_helper(&runtime::U64_TO_STR, IrType::Ptr, &[wide])
            }
            ty if bounds::is_float(ty) => {
                let double = match value.value.ty {
                    IrType::Float => self
                        .func
                        .assign(IrType::Double, format_args!("fpext {} to double", value.value)),
                    _ => value.value,
                };
                self.call_helper(&runtime::F64_TO_STR, IrType::Ptr, &[double])
            }
            _ => return semantic!(pos, "cannot convert {} to string", value.label()),
        };
        Ok(text)
    }

    /// Extends an integer to `i64`.
    pub(super) fn widen(&mut self, value: Value, signed: bool) -> Value {
        if value.ty == IrType::Int(64) {
            return value;
        }
        let op = if signed { "sext" } else { "zext" };
        self.func
            .assign(IrType::Int(64), format_args!("{op} {value} to i64"))
    }

    pub(super) fn call_helper(&mut self, helper: &Helper, ret: IrType, args: &[Value]) -> Value {
        self.module.require(helper);
        let args = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if ret == IrType::Void {
            self.func
                .emit(format_args!("call void {}({args})", helper.symbol));
            return Value::void();
        }
        self.func
            .assign(ret.clone(), format_args!("call {ret} {}({args})", helper.symbol))
    }

    /// Lowers a value into an `i1` usable by a conditional branch.
    pub(super) fn to_condition(&mut self, value: &Typed, pos: Position) -> Result<String> {
        let v = &value.value;
        let cond = match &v.ty {
            IrType::Int(1) => return Ok(v.repr.clone()),
            IrType::Int(_) => self.func.assign(IrType::BOOL, format_args!("icmp ne {v}, 0")),
            IrType::Float | IrType::Double => self
                .func
                .assign(IrType::BOOL, format_args!("fcmp une {v}, 0.0")),
            _ => {
                return semantic!(
                    pos,
                    "condition must be a boolean or a number, found {}",
                    value.label()
                )
            }
        };
        Ok(cond.repr)
    }

    fn gen_format(&mut self, segments: &[String], args: &[Expr]) -> Result<Typed> {
        let mut text: Option<Value> = None;
        for (index, segment) in segments.iter().enumerate() {
            if !segment.is_empty() {
                let piece = self.module.string_constant(segment);
                text = Some(self.concat(text, piece));
            }
            if let Some(arg) = args.get(index) {
                let value = self.gen_expr(arg, None)?;
                let piece = self.to_text(value, arg.pos)?;
                text = Some(self.concat(text, piece));
            }
        }
        let text = match text {
            Some(text) => text,
            None => self.module.string_constant(""),
        };
        Ok(Typed::new(text, VarType::String))
    }

    fn concat(&mut self, acc: Option<Value>, next: Value) -> Value {
        match acc {
            Some(acc) => self.call_helper(&runtime::CONCAT, IrType::Ptr, &[acc, next]),
            None => next,
        }
    }

    fn gen_call(&mut self, callee: &Callee, args: &[Expr], pos: Position) -> Result<Typed> {
        match callee {
            Callee::Named(name) => {
                if let Some(sig) = self.functions.get(name).cloned() {
                    return self.call_function(&sig, None, args, pos);
                }
                if self.options.stdlib {
                    match stdlib::lookup_function(name, args.len()) {
                        Ok(Some(builtin)) => return self.gen_builtin(builtin, args, pos),
                        Err(message) => return semantic!(pos, "{message}"),
                        Ok(None) => {}
                    }
                }
                semantic!(pos, "unknown function `{name}`")
            }
            Callee::Expr(target) => match &target.kind {
                ExprKind::Member { object, member } => {
                    if let Some(path) = self.module_path(object) {
                        return self.call_module_member(&path, member, args, pos);
                    }
                    let receiver = self.gen_expr(object, None)?;
                    let owner = match (receiver.ty, &receiver.type_name) {
                        (VarType::Struct, Some(owner)) => owner.clone(),
                        _ => return semantic!(pos, "{} has no method `{member}`", receiver.label()),
                    };
                    let Some(sig) = self.functions.get(&format!("{owner}.{member}")).cloned() else {
                        return semantic!(pos, "struct `{owner}` has no method `{member}`");
                    };
                    self.call_function(&sig, Some(receiver.value), args, pos)
                }
                _ => semantic!(pos, "expression is not callable"),
            },
        }
    }

    fn call_module_member(
        &mut self,
        path: &str,
        member: &str,
        args: &[Expr],
        pos: Position,
    ) -> Result<Typed> {
        if !self.options.stdlib {
            return semantic!(
                pos,
                "unknown function `{path}.{member}`: the standard library is disabled"
            );
        }
        match stdlib::lookup_member(path, member) {
            Some(Member::Function { builtin, arity }) => {
                if arity != args.len() {
                    let name = format!("{path}.{member}");
                    return semantic!(pos, "{}", stdlib::arity_message(&name, arity, args.len()));
                }
                self.gen_builtin(builtin, args, pos)
            }
            Some(Member::Constant(_)) => {
                semantic!(pos, "`{path}.{member}` is a constant, not a function")
            }
            None => semantic!(pos, "unknown function `{path}.{member}`"),
        }
    }

    fn call_function(
        &mut self,
        sig: &Signature,
        receiver: Option<Value>,
        args: &[Expr],
        pos: Position,
    ) -> Result<Typed> {
        if args.len() != sig.params.len() {
            return semantic!(
                pos,
                "{}",
                stdlib::arity_message(&sig.name, sig.params.len(), args.len())
            );
        }
        let mut operands = Vec::with_capacity(args.len() + 1);
        if let Some(receiver) = receiver {
            operands.push(format!("ptr {}", receiver.repr));
        }
        for (arg, param) in args.iter().zip(&sig.params) {
            let value = self.gen_expr_as(arg, param.ty, param.type_name.as_deref())?;
            operands.push(value.to_string());
        }
        let operands = operands.join(", ");

        let ret = storage_type(sig.ret, sig.ret_name.as_deref());
        match sig.ret {
            VarType::Void => {
                self.func
                    .emit(format_args!("call void @{}({operands})", sig.symbol));
                Ok(Typed::void())
            }
            VarType::Struct => {
                let value = self
                    .func
                    .assign(ret.clone(), format_args!("call {ret} @{}({operands})", sig.symbol));
                let slot = self.func.alloca(&ret, "ret");
                self.store(&ret, &value, &slot);
                let owner = sig.ret_name.clone().unwrap_or_default();
                Ok(Typed::named(Value::new(IrType::Ptr, slot), VarType::Struct, owner))
            }
            ty => {
                let value = self
                    .func
                    .assign(ret.clone(), format_args!("call {ret} @{}({operands})", sig.symbol));
                Ok(Typed::new(value, ty))
            }
        }
    }

    fn gen_member(&mut self, object: &Expr, member: &str, pos: Position) -> Result<Typed> {
        if let Some(path) = self.module_path(object) {
            if !self.options.stdlib {
                return semantic!(
                    pos,
                    "unknown module member `{path}.{member}`: the standard library is disabled"
                );
            }
            let nested = format!("{path}.{member}");
            return match stdlib::lookup_member(&path, member) {
                Some(Member::Constant(value)) => Ok(Typed::new(
                    Value::float(IrType::Double, value),
                    VarType::Float64,
                )),
                Some(Member::Function { .. }) => {
                    semantic!(pos, "`{nested}` is a function and must be called")
                }
                None if stdlib::is_module(&nested) => Ok(Typed::named(
                    Value::new(IrType::Ptr, "null"),
                    VarType::Module,
                    nested,
                )),
                None => semantic!(pos, "module `{path}` has no member `{member}`"),
            };
        }

        let object = self.gen_expr(object, None)?;
        let (ptr, field) = self.field_ptr(&object, member, pos)?;
        if field.ty == VarType::Struct {
            let owner = field.type_name.unwrap_or_default();
            return Ok(Typed::named(ptr, VarType::Struct, owner));
        }
        let ty = storage_type(field.ty, None);
        let value = self
            .func
            .assign(ty.clone(), format_args!("load {ty}, ptr {}", ptr.repr));
        Ok(Typed::new(value, field.ty))
    }

    /// The address of `member` inside the struct `object` points to.
    pub(super) fn field_ptr(
        &mut self,
        object: &Typed,
        member: &str,
        pos: Position,
    ) -> Result<(Value, Param)> {
        let (VarType::Struct, Some(name)) = (object.ty, object.type_name.as_deref()) else {
            return semantic!(pos, "cannot access member `{member}` of {}", object.label());
        };
        let mut fields = self.struct_fields(name, pos)?;
        let Some(index) = fields.iter().position(|f| f.name == member) else {
            return semantic!(pos, "struct `{name}` has no field `{member}`");
        };
        let ptr = self.func.assign(
            IrType::Ptr,
            format_args!(
                "getelementptr inbounds %struct.{name}, ptr {}, i32 0, i32 {index}",
                object.value.repr
            ),
        );
        Ok((ptr, fields.swap_remove(index)))
    }

    pub(super) fn struct_fields(&self, name: &str, pos: Position) -> Result<Vec<Param>> {
        match self.structs.get(name) {
            Some(fields) => Ok(fields.clone()),
            None => semantic!(pos, "unknown struct `{name}`"),
        }
    }

    fn gen_struct_literal(
        &mut self,
        name: &str,
        fields: &[(String, Expr)],
        pos: Position,
    ) -> Result<Typed> {
        self.struct_fields(name, pos)?;
        let ty = IrType::Struct(name.to_owned());
        let slot = self.func.alloca(&ty, "lit");
        self.func
            .emit(format_args!("store {ty} zeroinitializer, ptr {slot}"));
        let object = Typed::named(Value::new(IrType::Ptr, slot), VarType::Struct, name);

        let mut seen = HashSet::new();
        for (field, value) in fields {
            if !seen.insert(field.as_str()) {
                return semantic!(value.pos, "field `{field}` is initialized twice");
            }
            let (ptr, param) = self.field_ptr(&object, field, value.pos)?;
            let value = self.gen_expr_as(value, param.ty, param.type_name.as_deref())?;
            let field_ty = storage_type(param.ty, param.type_name.as_deref());
            self.store(&field_ty, &value, &ptr.repr);
        }
        Ok(object)
    }

    /// The module path an expression names, through aliases.
    pub(super) fn module_path(&self, expr: &Expr) -> Option<String> {
        match &expr.kind {
            ExprKind::Module(path) => Some(path.clone()),
            ExprKind::Variable(name) => self.lookup_alias(name).map(str::to_owned),
            _ => None,
        }
    }
}

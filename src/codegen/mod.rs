//! Semantic checks and lowering of the AST into textual LLVM IR.
//!
//! A single walk does both jobs: names are resolved against the scope stack,
//! values are coerced between source types, and control flow is lowered into
//! basic blocks as the tree is visited. The first error aborts the walk.

use std::collections::{HashMap, HashSet};

use crate::{
    ast::{Expr, ExprKind, FunctionDecl, Param, Program, Stmt, StmtKind, StructDecl, VarDecl},
    bigint::BigInt,
    bounds,
    codegen::{
        interface::CompileOptions,
        ir::{BlockId, Function, IrType, Module, Value},
    },
    error::{semantic, Result},
    token::Position,
    types::VarType,
};

mod builtins;
mod expr;
pub mod interface;
pub mod ir;
pub mod runtime;

/// Lowers a parsed program into a complete IR module.
pub fn generate(program: &Program, options: &CompileOptions) -> Result<String> {
    let mut g = Generator::new(options);
    g.declare_types(program)?;
    g.declare_globals(program)?;
    g.declare_functions(program)?;
    g.emit_functions(program)?;
    g.emit_entry(program)?;
    Ok(g.module.render())
}

/// A backend value paired with the source type it was computed as.
#[derive(Clone, Debug)]
struct Typed {
    value: Value,
    ty: VarType,
    /// Struct name or module path.
    type_name: Option<String>,
}

impl Typed {
    fn new(value: Value, ty: VarType) -> Typed {
        Typed {
            value,
            ty,
            type_name: None,
        }
    }

    fn named(value: Value, ty: VarType, type_name: impl Into<String>) -> Typed {
        Typed {
            value,
            ty,
            type_name: Some(type_name.into()),
        }
    }

    fn void() -> Typed {
        Typed::new(Value::void(), VarType::Void)
    }

    fn label(&self) -> String {
        type_label(self.ty, self.type_name.as_deref())
    }
}

/// Where a variable lives. Struct variables are used through their address.
#[derive(Clone, Debug)]
struct Binding {
    ptr: String,
    ty: VarType,
    type_name: Option<String>,
}

#[derive(Debug, Default)]
struct Frame {
    bindings: HashMap<String, Binding>,
    /// Names standing for standard library modules, such as `io` in
    /// `const io = std.io;`.
    aliases: HashMap<String, String>,
    consts: HashSet<String>,
}

/// What a name resolves to in the innermost frame declaring it.
enum Name<'g> {
    Variable(&'g Binding),
    Alias(&'g str),
}

#[derive(Clone, Debug)]
struct Signature {
    name: String,
    symbol: String,
    params: Vec<Param>,
    ret: VarType,
    ret_name: Option<String>,
}

#[derive(Copy, Clone, Debug)]
struct Loop {
    continue_to: BlockId,
    break_to: BlockId,
}

/// How the process entry symbol comes to be.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EntryKind {
    /// The entry function already has the `i32 main()` shape.
    Direct,
    /// A `main` wrapper calls the entry function and normalizes its result.
    Wrapped,
}

struct Generator<'o> {
    options: &'o CompileOptions,
    module: Module,
    /// The function being generated.
    func: Function,
    scopes: Vec<Frame>,
    loops: Vec<Loop>,
    functions: HashMap<String, Signature>,
    structs: HashMap<String, Vec<Param>>,
    enums: HashMap<String, HashMap<String, i64>>,
    entry: Option<(String, EntryKind)>,
    /// Name and return type of the function being generated.
    current_fn: String,
    ret: (VarType, Option<String>),
}

impl Generator<'_> {
    fn new(options: &CompileOptions) -> Generator<'_> {
        Generator {
            options,
            module: Module::new(options.target.triple()),
            func: Function::new("", IrType::Void, Vec::new()),
            scopes: vec![Frame::default()],
            loops: Vec::new(),
            functions: HashMap::new(),
            structs: HashMap::new(),
            enums: HashMap::new(),
            entry: None,
            current_fn: String::new(),
            ret: (VarType::Void, None),
        }
    }

    /// Registers struct layouts and evaluates every enum member, so both are
    /// available to anything emitted later.
    fn declare_types(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Struct(decl) => self.declare_struct(decl, stmt.pos)?,
                StmtKind::Enum(decl) => {
                    if self.enums.contains_key(&decl.name) {
                        return semantic!(stmt.pos, "enum `{}` is already declared", decl.name);
                    }
                    let mut members = HashMap::new();
                    for (member, value) in &decl.members {
                        let value = self.enum_value(&decl.name, &members, value)?;
                        if members.insert(member.clone(), value).is_some() {
                            return semantic!(
                                stmt.pos,
                                "enum `{}` declares `{member}` twice",
                                decl.name
                            );
                        }
                    }
                    tracing::trace!(name = %decl.name, members = members.len(), "enum");
                    self.enums.insert(decl.name.clone(), members);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_struct(&mut self, decl: &StructDecl, pos: Position) -> Result<()> {
        if self.structs.contains_key(&decl.name) {
            return semantic!(pos, "struct `{}` is already declared", decl.name);
        }
        let mut seen = HashSet::new();
        for field in &decl.fields {
            if !seen.insert(&field.name) {
                return semantic!(pos, "struct `{}` declares field `{}` twice", decl.name, field.name);
            }
            if field.ty == VarType::Void {
                return semantic!(pos, "field `{}` cannot have type void", field.name);
            }
        }
        let layout = decl
            .fields
            .iter()
            .map(|f| storage_type(f.ty, f.type_name.as_deref()))
            .collect();
        self.module.add_struct_type(&decl.name, layout);
        self.structs.insert(decl.name.clone(), decl.fields.clone());
        Ok(())
    }

    /// Folds an enum member initializer into a constant `int32`.
    fn enum_value(
        &self,
        enum_name: &str,
        members: &HashMap<String, i64>,
        expr: &Expr,
    ) -> Result<i64> {
        use crate::ast::{BinaryOp, UnaryOp};

        let value = match &expr.kind {
            ExprKind::Int(value) => value.to_i128(),
            ExprKind::EnumValue {
                enum_name: name,
                member,
            } => {
                let value = if name == enum_name {
                    members.get(member)
                } else {
                    self.enums.get(name).and_then(|m| m.get(member))
                };
                match value {
                    Some(&value) => Some(i128::from(value)),
                    None => return semantic!(expr.pos, "unknown enum member `{name}.{member}`"),
                }
            }
            ExprKind::Unary { op, expr: inner } => {
                let inner = i128::from(self.enum_value(enum_name, members, inner)?);
                match op {
                    UnaryOp::Neg => Some(-inner),
                    UnaryOp::BitNot => Some(!inner),
                    UnaryOp::Not => None,
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let a = i128::from(self.enum_value(enum_name, members, lhs)?);
                let b = i128::from(self.enum_value(enum_name, members, rhs)?);
                match op {
                    BinaryOp::Add => a.checked_add(b),
                    BinaryOp::Sub => a.checked_sub(b),
                    BinaryOp::Mul => a.checked_mul(b),
                    BinaryOp::Div => a.checked_div(b),
                    BinaryOp::Mod => a.checked_rem(b),
                    BinaryOp::BitAnd => Some(a & b),
                    BinaryOp::BitOr => Some(a | b),
                    BinaryOp::BitXor => Some(a ^ b),
                    BinaryOp::Shl => u32::try_from(b).ok().and_then(|b| a.checked_shl(b)),
                    BinaryOp::Shr => u32::try_from(b).ok().and_then(|b| a.checked_shr(b)),
                    _ => None,
                }
            }
            _ => None,
        };
        let Some(value) = value else {
            return semantic!(
                expr.pos,
                "enum `{enum_name}` members must be constant integer expressions"
            );
        };
        let big = BigInt::from(value);
        if !bounds::check_bounds(VarType::Int32, &big) {
            return semantic!(expr.pos, "{}", bounds::out_of_bounds_message(VarType::Int32, &big));
        }
        Ok(i64::try_from(value).unwrap_or_default())
    }

    /// Emits every top-level variable as a global initialized with a
    /// compile-time constant.
    fn declare_globals(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            let StmtKind::VarDecl(decl) = &stmt.kind else {
                continue;
            };
            if decl.ty == VarType::Module {
                self.declare_alias(decl, stmt.pos)?;
                continue;
            }
            if decl.ty == VarType::Void {
                return semantic!(stmt.pos, "variable `{}` cannot have type void", decl.name);
            }

            let ty = storage_type(decl.ty, decl.type_name.as_deref());
            let init = match &decl.initializer {
                Some(init) => self.constant(init, decl.ty, decl.type_name.as_deref(), &decl.name)?,
                None => ty.zero().to_owned(),
            };
            let ptr = format!("@g.{}", decl.name);
            let kind = if decl.is_const { "constant" } else { "global" };
            self.module.add_global(format!("{ptr} = internal {kind} {ty} {init}"));
            self.bind(decl, ptr);
        }
        Ok(())
    }

    /// Renders a global initializer. Only literals, enum values and struct
    /// literals made of those are accepted.
    fn constant(
        &mut self,
        expr: &Expr,
        ty: VarType,
        type_name: Option<&str>,
        global: &str,
    ) -> Result<String> {
        let not_constant = || {
            semantic!(
                expr.pos,
                "global `{global}` must be initialized with a compile-time constant of type {}",
                type_label(ty, type_name)
            )
        };
        if let Some(value) = expr::int_literal(expr) {
            if bounds::is_float(ty) {
                let value = value.to_string().parse::<f64>().unwrap_or_default();
                return Ok(Value::float(storage_type(ty, None), value).repr);
            }
            if bounds::bounds(ty).is_none() {
                return not_constant();
            }
            if !bounds::check_bounds(ty, &value) {
                return semantic!(expr.pos, "{}", bounds::out_of_bounds_message(ty, &value));
            }
            let IrType::Int(bits) = storage_type(ty, None) else {
                return not_constant();
            };
            return Ok(Value::int(bits, &value).repr);
        }
        if let Some(value) = expr::float_literal(expr) {
            if !bounds::is_float(ty) {
                return not_constant();
            }
            return Ok(Value::float(storage_type(ty, None), value).repr);
        }
        let repr = match (&expr.kind, ty) {
            (ExprKind::Bool(value), VarType::Bool | VarType::Uint0) => Value::bool(*value).repr,
            (ExprKind::String(text), VarType::String) => self.module.string_constant(text).repr,
            (ExprKind::EnumValue { enum_name, member }, ty) if bounds::is_integer(ty) => {
                let Some(&value) = self.enums.get(enum_name).and_then(|m| m.get(member)) else {
                    return semantic!(expr.pos, "unknown enum member `{enum_name}.{member}`");
                };
                let big = BigInt::from(value);
                if !bounds::check_bounds(ty, &big) {
                    return semantic!(expr.pos, "{}", bounds::out_of_bounds_message(ty, &big));
                }
                value.to_string()
            }
            (ExprKind::StructLiteral { name, fields }, VarType::Struct)
                if Some(name.as_str()) == type_name =>
            {
                let layout = self.struct_fields(name, expr.pos)?;
                let mut values = Vec::with_capacity(layout.len());
                for field in &layout {
                    let field_ty = storage_type(field.ty, field.type_name.as_deref());
                    let value = match fields.iter().find(|(f, _)| *f == field.name) {
                        Some((_, value)) => {
                            self.constant(value, field.ty, field.type_name.as_deref(), global)?
                        }
                        None => field_ty.zero().to_owned(),
                    };
                    values.push(format!("{field_ty} {value}"));
                }
                if let Some((unknown, _)) =
                    fields.iter().find(|(f, _)| !layout.iter().any(|l| l.name == *f))
                {
                    return semantic!(expr.pos, "struct `{name}` has no field `{unknown}`");
                }
                format!("{{ {} }}", values.join(", "))
            }
            _ => return not_constant(),
        };
        Ok(repr)
    }

    fn declare_alias(&mut self, decl: &VarDecl, pos: Position) -> Result<()> {
        let path = decl.initializer.as_ref().and_then(|init| self.module_path(init));
        let Some(path) = path else {
            return semantic!(pos, "`{}` must be initialized with a module", decl.name);
        };
        tracing::trace!(alias = %decl.name, %path, "module alias");
        let frame = self.frame();
        frame.aliases.insert(decl.name.clone(), path);
        if decl.is_const {
            frame.consts.insert(decl.name.clone());
        }
        Ok(())
    }

    /// Collects every function and method signature and settles the entry
    /// point, before any body is generated.
    fn declare_functions(&mut self, program: &Program) -> Result<()> {
        let entry = entry_function(program);
        if let Some((decl, pos)) = entry {
            if !decl.params.is_empty() {
                return semantic!(pos, "entry function `{}` must not take parameters", decl.name);
            }
            let kind = match decl.return_ty {
                VarType::Int32 => EntryKind::Direct,
                ty if ty == VarType::Void || ty == VarType::Bool || bounds::is_integer(ty) => {
                    EntryKind::Wrapped
                }
                ty => {
                    return semantic!(
                        pos,
                        "malformed entry signature: `{}` cannot return {ty}",
                        decl.name
                    )
                }
            };
            self.entry = Some((decl.name.clone(), kind));
        }

        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Function(decl) => {
                    let symbol = match &self.entry {
                        Some((name, EntryKind::Direct)) if *name == decl.name => "main".to_owned(),
                        _ => format!("f.{}", decl.name),
                    };
                    self.declare_function(decl.name.clone(), symbol, decl, stmt.pos)?;
                }
                StmtKind::Struct(decl) => {
                    for method in &decl.methods {
                        let key = format!("{}.{}", decl.name, method.name);
                        let symbol = format!("f.{key}");
                        self.declare_function(key, symbol, method, stmt.pos)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_function(
        &mut self,
        key: String,
        symbol: String,
        decl: &FunctionDecl,
        pos: Position,
    ) -> Result<()> {
        if self.functions.contains_key(&key) {
            return semantic!(pos, "function `{key}` is already declared");
        }
        let mut seen = HashSet::new();
        for param in &decl.params {
            if !seen.insert(&param.name) {
                return semantic!(pos, "parameter `{}` is declared twice in `{key}`", param.name);
            }
            if param.ty == VarType::Void {
                return semantic!(pos, "parameter `{}` cannot have type void", param.name);
            }
        }
        let signature = Signature {
            name: key.clone(),
            symbol,
            params: decl.params.clone(),
            ret: decl.return_ty,
            ret_name: decl.return_type_name.clone(),
        };
        self.functions.insert(key, signature);
        Ok(())
    }

    fn emit_functions(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            match &stmt.kind {
                StmtKind::Function(decl) => self.gen_function(&decl.name, decl, None, stmt.pos)?,
                StmtKind::Struct(s) => {
                    for method in &s.methods {
                        let key = format!("{}.{}", s.name, method.name);
                        self.gen_function(&key, method, Some(&s.name), stmt.pos)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn gen_function(
        &mut self,
        key: &str,
        decl: &FunctionDecl,
        owner: Option<&str>,
        pos: Position,
    ) -> Result<()> {
        let Some(sig) = self.functions.get(key).cloned() else {
            return semantic!(pos, "unknown function `{key}`");
        };
        tracing::debug!(function = key, symbol = %sig.symbol, "generating function");

        let mut params = Vec::new();
        if owner.is_some() {
            params.push((IrType::Ptr, "%arg.self".to_owned()));
        }
        for param in &sig.params {
            let ty = param_type(param.ty, param.type_name.as_deref());
            params.push((ty, format!("%arg.{}", param.name)));
        }
        let ret = storage_type(sig.ret, sig.ret_name.as_deref());
        let func = Function::new(&sig.symbol, ret, params);

        self.current_fn = key.to_owned();
        self.ret = (sig.ret, sig.ret_name.clone());
        self.with_function(func, |g| {
            g.scoped(|g| {
                if let Some(owner) = owner {
                    let binding = Binding {
                        ptr: "%arg.self".to_owned(),
                        ty: VarType::Struct,
                        type_name: Some(owner.to_owned()),
                    };
                    g.frame().bindings.insert("self".to_owned(), binding);
                }
                for param in &sig.params {
                    let ty = storage_type(param.ty, param.type_name.as_deref());
                    let slot = g.func.alloca(&ty, &param.name);
                    let arg = format!("%arg.{}", param.name);
                    let value = match param.ty {
                        VarType::Struct => Value::new(IrType::Ptr, arg),
                        _ => Value::new(ty.clone(), arg),
                    };
                    g.store(&ty, &value, &slot);
                    let binding = Binding {
                        ptr: slot,
                        ty: param.ty,
                        type_name: param.type_name.clone(),
                    };
                    g.frame().bindings.insert(param.name.clone(), binding);
                }

                g.gen_block(&decl.body)?;

                if !g.func.is_terminated() {
                    if sig.ret != VarType::Void {
                        return semantic!(
                            pos,
                            "missing return in function `{}`: it must end with a return of {}",
                            decl.name,
                            type_label(sig.ret, sig.ret_name.as_deref())
                        );
                    }
                    g.func.terminate("ret void");
                }
                Ok(())
            })
        })
    }

    /// Emits the process entry symbol using exactly one strategy: the marked
    /// entry function, a function named `main`, or a synthesized `main` made
    /// of the top-level statements.
    fn emit_entry(&mut self, program: &Program) -> Result<()> {
        let loose = program.statements.iter().filter(|s| !s.kind.is_declaration());
        if self.entry.is_some() && loose.count() > 0 {
            tracing::warn!("top-level statements are ignored when an entry function exists");
        }
        match self.entry.clone() {
            Some((name, EntryKind::Direct)) => {
                tracing::debug!(function = %name, "entry point is used directly");
                Ok(())
            }
            Some((name, EntryKind::Wrapped)) => {
                tracing::debug!(function = %name, "wrapping entry point");
                let Some(sig) = self.functions.get(&name).cloned() else {
                    return semantic!(program_pos(program), "unknown entry function `{name}`");
                };
                let func = Function::new("main", IrType::Int(32), Vec::new());
                self.with_function(func, |g| {
                    let ret = storage_type(sig.ret, None);
                    let value = if sig.ret == VarType::Void {
                        g.func.emit(format_args!("call void @{}()", sig.symbol));
                        Value::int(32, 0)
                    } else {
                        let result = g.func.assign(ret.clone(), format_args!("call {ret} @{}()", sig.symbol));
                        let result = Typed::new(result, sig.ret);
                        g.coerce(result, VarType::Int32, None, Position::default())?
                    };
                    g.func.terminate(format_args!("ret {value}"));
                    Ok(())
                })
            }
            None => {
                let body: Vec<&Stmt> = program
                    .statements
                    .iter()
                    .filter(|s| !s.kind.is_declaration())
                    .collect();
                tracing::debug!(statements = body.len(), "synthesizing entry point");
                let func = Function::new("main", IrType::Int(32), Vec::new());
                self.current_fn = "main".to_owned();
                self.ret = (VarType::Int32, None);
                self.with_function(func, |g| {
                    g.scoped(|g| {
                        for stmt in body {
                            if g.func.is_terminated() {
                                break;
                            }
                            g.gen_stmt(stmt)?;
                        }
                        if !g.func.is_terminated() {
                            g.func.terminate("ret i32 0");
                        }
                        Ok(())
                    })
                })
            }
        }
    }
}

/// Statements.
impl Generator<'_> {
    fn gen_block(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            // Whatever follows a return, STOP or NEXT is dead.
            if self.func.is_terminated() {
                break;
            }
            self.gen_stmt(stmt)?;
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        let pos = stmt.pos;
        match &stmt.kind {
            StmtKind::VarDecl(decl) => self.gen_local(decl, pos),
            StmtKind::Assign { target, value } => self.gen_assign(target, value, pos),
            StmtKind::MemberAssign {
                object,
                member,
                value,
            } => self.gen_member_assign(object, member, value, pos),
            StmtKind::Block(body) => self.scoped(|g| g.gen_block(body)),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.gen_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => self.gen_while(condition, body),
            StmtKind::For {
                init,
                condition,
                increment,
                body,
            } => self.gen_for(init, condition, increment, body),
            StmtKind::Return(value) => self.gen_return(value.as_ref(), pos),
            StmtKind::Break | StmtKind::Continue => {
                let Some(target) = self.loops.last().copied() else {
                    let keyword = if stmt.kind == StmtKind::Break { "STOP" } else { "NEXT" };
                    return semantic!(pos, "`{keyword}` used outside of a loop");
                };
                if stmt.kind == StmtKind::Break {
                    self.func.br(target.break_to);
                } else {
                    self.func.br(target.continue_to);
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.gen_expr(expr, None).map(drop),
            StmtKind::Function(decl) => {
                semantic!(pos, "function `{}` must be declared at the top level", decl.name)
            }
            StmtKind::Struct(decl) => {
                semantic!(pos, "struct `{}` must be declared at the top level", decl.name)
            }
            StmtKind::Enum(decl) => {
                semantic!(pos, "enum `{}` must be declared at the top level", decl.name)
            }
        }
    }

    fn gen_local(&mut self, decl: &VarDecl, pos: Position) -> Result<()> {
        let frame = self.frame();
        if frame.bindings.contains_key(&decl.name) || frame.aliases.contains_key(&decl.name) {
            return semantic!(pos, "variable `{}` is already declared in this scope", decl.name);
        }
        match decl.ty {
            VarType::Module => return self.declare_alias(decl, pos),
            VarType::Void => {
                return semantic!(pos, "variable `{}` cannot have type void", decl.name);
            }
            _ => {}
        }

        let ty = storage_type(decl.ty, decl.type_name.as_deref());
        let value = match &decl.initializer {
            Some(init) => self.gen_expr_as(init, decl.ty, decl.type_name.as_deref())?,
            None => Value::new(ty.clone(), ty.zero()),
        };
        let slot = self.func.alloca(&ty, &decl.name);
        self.store(&ty, &value, &slot);
        self.bind(decl, slot);
        Ok(())
    }

    fn gen_assign(&mut self, target: &str, value: &Expr, pos: Position) -> Result<()> {
        if self.lookup_alias(target).is_some() {
            if self.is_const(target) {
                return semantic!(pos, "cannot assign to `{target}`: it is constant");
            }
            let Some(path) = self.module_path(value) else {
                return semantic!(pos, "`{target}` can only be assigned a module");
            };
            let frame = self.scopes.iter_mut().rev().find(|f| f.aliases.contains_key(target));
            if let Some(frame) = frame {
                frame.aliases.insert(target.to_owned(), path);
            }
            return Ok(());
        }
        let Some(binding) = self.lookup(target).cloned() else {
            return semantic!(pos, "unknown variable `{target}`");
        };
        if self.is_const(target) {
            return semantic!(pos, "cannot assign to `{target}`: it is constant");
        }
        if binding.ty == VarType::Uint0 {
            return semantic!(pos, "cannot assign to `{target}`: uint0 values are read-only");
        }
        let value = self.gen_expr_as(value, binding.ty, binding.type_name.as_deref())?;
        let ty = storage_type(binding.ty, binding.type_name.as_deref());
        self.store(&ty, &value, &binding.ptr);
        Ok(())
    }

    fn gen_member_assign(
        &mut self,
        object: &Expr,
        member: &str,
        value: &Expr,
        pos: Position,
    ) -> Result<()> {
        let mut root = object;
        while let ExprKind::Member { object, .. } = &root.kind {
            root = object.as_ref();
        }
        if let ExprKind::Variable(root) = &root.kind {
            if self.is_const(root) {
                return semantic!(pos, "cannot assign to field `{member}`: `{root}` is constant");
            }
        }
        let object = self.gen_expr(object, None)?;
        let (ptr, field) = self.field_ptr(&object, member, pos)?;
        if field.ty == VarType::Uint0 {
            return semantic!(pos, "cannot assign to `{member}`: uint0 values are read-only");
        }
        let value = self.gen_expr_as(value, field.ty, field.type_name.as_deref())?;
        let ty = storage_type(field.ty, field.type_name.as_deref());
        self.store(&ty, &value, &ptr.repr);
        Ok(())
    }

    fn gen_return(&mut self, value: Option<&Expr>, pos: Position) -> Result<()> {
        let (ret, ret_name) = self.ret.clone();
        match (value, ret) {
            (None, VarType::Void) => self.func.terminate("ret void"),
            (None, _) => {
                return semantic!(
                    pos,
                    "function `{}` must return a value of type {}",
                    self.current_fn,
                    type_label(ret, ret_name.as_deref())
                );
            }
            (Some(_), VarType::Void) => {
                return semantic!(
                    pos,
                    "cannot return a value from `{}`, which returns void",
                    self.current_fn
                );
            }
            (Some(value), _) => {
                let value = self.gen_expr_as(value, ret, ret_name.as_deref())?;
                let ty = storage_type(ret, ret_name.as_deref());
                let value = self.load_aggregate(&ty, value);
                self.func.terminate(format_args!("ret {value}"));
            }
        }
        Ok(())
    }

    /// Lowers an `if`. The merge block is only created when some arm falls
    /// through, so an `if` whose arms all return leaves the builder in a
    /// terminated block.
    fn gen_if(
        &mut self,
        condition: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&Stmt>,
    ) -> Result<()> {
        let cond = self.gen_expr(condition, None)?;
        let cond = self.to_condition(&cond, condition.pos)?;

        let then_bb = self.func.new_block("if.then");
        let mut merge = None;
        let else_bb = if else_branch.is_some() {
            self.func.new_block("if.else")
        } else {
            *merge.insert(self.func.new_block("if.end"))
        };
        self.func.cond_br(&cond, then_bb, else_bb);

        self.func.position_at(then_bb);
        self.scoped(|g| g.gen_block(then_branch))?;
        if !self.func.is_terminated() {
            let end = *merge.get_or_insert_with(|| self.func.new_block("if.end"));
            self.func.br(end);
        }

        if let Some(else_branch) = else_branch {
            self.func.position_at(else_bb);
            self.scoped(|g| g.gen_stmt(else_branch))?;
            if !self.func.is_terminated() {
                let end = *merge.get_or_insert_with(|| self.func.new_block("if.end"));
                self.func.br(end);
            }
        }

        if let Some(end) = merge {
            self.func.position_at(end);
        }
        Ok(())
    }

    fn gen_while(&mut self, condition: &Expr, body: &[Stmt]) -> Result<()> {
        let cond_bb = self.func.new_block("while.cond");
        let body_bb = self.func.new_block("while.body");
        let end_bb = self.func.new_block("while.end");
        self.func.br(cond_bb);

        self.func.position_at(cond_bb);
        let cond = self.gen_expr(condition, None)?;
        let cond = self.to_condition(&cond, condition.pos)?;
        self.func.cond_br(&cond, body_bb, end_bb);

        self.func.position_at(body_bb);
        self.in_loop(cond_bb, end_bb, |g| g.scoped(|g| g.gen_block(body)))?;
        if !self.func.is_terminated() {
            self.func.br(cond_bb);
        }

        self.func.position_at(end_bb);
        Ok(())
    }

    fn gen_for(
        &mut self,
        init: &Stmt,
        condition: &Expr,
        increment: &Stmt,
        body: &[Stmt],
    ) -> Result<()> {
        check_loop_bound(init, condition)?;

        self.scoped(|g| {
            g.gen_stmt(init)?;
            let cond_bb = g.func.new_block("for.cond");
            let body_bb = g.func.new_block("for.body");
            let inc_bb = g.func.new_block("for.inc");
            let end_bb = g.func.new_block("for.end");
            g.func.br(cond_bb);

            g.func.position_at(cond_bb);
            let cond = g.gen_expr(condition, None)?;
            let cond = g.to_condition(&cond, condition.pos)?;
            g.func.cond_br(&cond, body_bb, end_bb);

            g.func.position_at(body_bb);
            g.in_loop(inc_bb, end_bb, |g| g.scoped(|g| g.gen_block(body)))?;
            if !g.func.is_terminated() {
                g.func.br(inc_bb);
            }

            g.func.position_at(inc_bb);
            g.gen_stmt(increment)?;
            g.func.br(cond_bb);

            g.func.position_at(end_bb);
            Ok(())
        })
    }
}

/// Utility functions.
impl Generator<'_> {
    /// Runs `f` with `func` as the function being generated, then adds it to
    /// the module.
    fn with_function(
        &mut self,
        func: Function,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let previous = std::mem::replace(&mut self.func, func);
        let res = f(self);
        let func = std::mem::replace(&mut self.func, previous);
        res?;
        self.module.add_function(&func);
        Ok(())
    }

    /// Runs `f` inside a fresh scope frame, popping it even when `f` fails.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.scopes.push(Frame::default());
        let res = f(self);
        self.scopes.pop();
        res
    }

    fn in_loop<T>(
        &mut self,
        continue_to: BlockId,
        break_to: BlockId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.loops.push(Loop {
            continue_to,
            break_to,
        });
        let res = f(self);
        self.loops.pop();
        res
    }

    fn frame(&mut self) -> &mut Frame {
        if self.scopes.is_empty() {
            self.scopes.push(Frame::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn bind(&mut self, decl: &VarDecl, ptr: String) {
        let binding = Binding {
            ptr,
            ty: decl.ty,
            type_name: decl.type_name.clone(),
        };
        let frame = self.frame();
        frame.bindings.insert(decl.name.clone(), binding);
        if decl.is_const {
            frame.consts.insert(decl.name.clone());
        }
    }

    /// Resolves a name, innermost scope first. A variable and an alias of
    /// the same name shadow each other like two variables would.
    fn resolve(&self, name: &str) -> Option<Name<'_>> {
        self.scopes.iter().rev().find_map(|f| match f.bindings.get(name) {
            Some(binding) => Some(Name::Variable(binding)),
            None => f.aliases.get(name).map(|path| Name::Alias(path.as_str())),
        })
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        match self.resolve(name)? {
            Name::Variable(binding) => Some(binding),
            Name::Alias(_) => None,
        }
    }

    fn lookup_alias(&self, name: &str) -> Option<&str> {
        match self.resolve(name)? {
            Name::Alias(path) => Some(path),
            Name::Variable(_) => None,
        }
    }

    fn is_const(&self, name: &str) -> bool {
        self.scopes.iter().any(|f| f.consts.contains(name))
    }

    /// Stores `value` into `ptr`. Struct values are addresses, so they are
    /// copied through an aggregate load.
    fn store(&mut self, ty: &IrType, value: &Value, ptr: &str) {
        let value = self.load_aggregate(ty, value.clone());
        self.func.emit(format_args!("store {value}, ptr {ptr}"));
    }

    fn load_aggregate(&mut self, ty: &IrType, value: Value) -> Value {
        if matches!(ty, IrType::Struct(_)) && value.ty == IrType::Ptr {
            return self
                .func
                .assign(ty.clone(), format_args!("load {ty}, ptr {}", value.repr));
        }
        value
    }
}

/// The function the process starts in, if the program names one.
fn entry_function(program: &Program) -> Option<(&FunctionDecl, Position)> {
    let mut functions = program.statements.iter().filter_map(|s| match &s.kind {
        StmtKind::Function(f) => Some((f, s.pos)),
        _ => None,
    });
    match &program.entry_point {
        Some(name) => functions.find(|(f, _)| f.name == *name),
        None => functions.find(|(f, _)| f.name == "main"),
    }
}

fn program_pos(program: &Program) -> Position {
    program.statements.first().map(|s| s.pos).unwrap_or_default()
}

/// Rejects a `for` loop whose literal bound lies outside the range of its
/// loop variable, before any of the loop is generated.
fn check_loop_bound(init: &Stmt, condition: &Expr) -> Result<()> {
    let StmtKind::VarDecl(decl) = &init.kind else {
        return Ok(());
    };
    let ExprKind::Binary { op, lhs, rhs } = &condition.kind else {
        return Ok(());
    };
    if !op.is_comparison() || bounds::bounds(decl.ty).is_none() {
        return Ok(());
    }
    let is_loop_var = |e: &Expr| matches!(&e.kind, ExprKind::Variable(n) if *n == decl.name);
    let bound = if is_loop_var(lhs) {
        expr::int_literal(rhs)
    } else if is_loop_var(rhs) {
        expr::int_literal(lhs)
    } else {
        None
    };
    if let Some(bound) = bound {
        if !bounds::check_bounds(decl.ty, &bound) {
            return semantic!(
                condition.pos,
                "loop bound never reached: {}",
                bounds::out_of_bounds_message(decl.ty, &bound)
            );
        }
    }
    Ok(())
}

/// The backend storage type of a source type.
fn storage_type(ty: VarType, type_name: Option<&str>) -> IrType {
    match ty {
        VarType::Bool | VarType::Uint0 => IrType::BOOL,
        VarType::Float32 => IrType::Float,
        VarType::Float64 => IrType::Double,
        VarType::String | VarType::Module => IrType::Ptr,
        VarType::Struct => IrType::Struct(type_name.unwrap_or_default().to_owned()),
        VarType::Void => IrType::Void,
        ty => IrType::Int(ty.bits().unwrap_or(32)),
    }
}

/// Struct arguments are passed by address and copied by the callee.
fn param_type(ty: VarType, type_name: Option<&str>) -> IrType {
    match ty {
        VarType::Struct => IrType::Ptr,
        ty => storage_type(ty, type_name),
    }
}

fn type_label(ty: VarType, type_name: Option<&str>) -> String {
    match (ty, type_name) {
        (VarType::Struct, Some(name)) => name.to_owned(),
        (VarType::Module, Some(path)) => format!("module {path}"),
        _ => ty.to_string(),
    }
}

#[cfg(test)]
mod tests;

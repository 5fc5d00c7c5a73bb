use std::io::Write;

use crate::{ast::*, types::VarType};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    // Writing into a `Vec` can't fail.
    _ = print_program(&mut buf, program);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_expr_string(expr: &Expr) -> String {
    let mut buf = Vec::with_capacity(512);
    _ = print_expr(&mut buf, 0, expr);
    String::from_utf8_lossy(&buf).into_owned()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    if let Some(entry) = &program.entry_point {
        writeln!(w, "entrypoint {entry}")?;
    }
    for stmt in &program.statements {
        print_stmt(w, 0, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    match &stmt.kind {
        StmtKind::VarDecl(decl) => print_var_decl(w, i, decl)?,
        StmtKind::Assign { target, value } => {
            sp(w, i)?;
            writeln!(w, "assign {target}")?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::MemberAssign {
            object,
            member,
            value,
        } => {
            sp(w, i)?;
            writeln!(w, "assign .{member}")?;
            print_expr(w, i + 1, object)?;
            print_expr(w, i + 1, value)?;
        }
        StmtKind::Block(body) => {
            sp(w, i)?;
            writeln!(w, "block")?;
            print_body(w, i + 1, body)?;
        }
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            sp(w, i)?;
            writeln!(w, "if")?;
            print_expr(w, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "then")?;
            print_body(w, i + 2, then_branch)?;
            if let Some(else_branch) = else_branch {
                sp(w, i + 1)?;
                writeln!(w, "else")?;
                print_stmt(w, i + 2, else_branch)?;
            }
        }
        StmtKind::While { condition, body } => {
            sp(w, i)?;
            writeln!(w, "while")?;
            print_expr(w, i + 1, condition)?;
            sp(w, i + 1)?;
            writeln!(w, "do")?;
            print_body(w, i + 2, body)?;
        }
        StmtKind::For {
            init,
            condition,
            increment,
            body,
        } => {
            sp(w, i)?;
            writeln!(w, "for")?;
            print_stmt(w, i + 1, init)?;
            print_expr(w, i + 1, condition)?;
            print_stmt(w, i + 1, increment)?;
            sp(w, i + 1)?;
            writeln!(w, "do")?;
            print_body(w, i + 2, body)?;
        }
        StmtKind::Function(function) => print_function(w, i, function)?,
        StmtKind::Return(value) => {
            sp(w, i)?;
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_expr(w, i + 1, value)?;
            }
        }
        StmtKind::Break => {
            sp(w, i)?;
            writeln!(w, "STOP")?;
        }
        StmtKind::Continue => {
            sp(w, i)?;
            writeln!(w, "NEXT")?;
        }
        StmtKind::Enum(EnumDecl { name, members }) => {
            sp(w, i)?;
            writeln!(w, "enum {name}")?;
            for (member, value) in members {
                sp(w, i + 1)?;
                writeln!(w, "{member}")?;
                print_expr(w, i + 2, value)?;
            }
        }
        StmtKind::Struct(StructDecl {
            name,
            fields,
            methods,
        }) => {
            sp(w, i)?;
            writeln!(w, "struct {name}")?;
            for field in fields {
                sp(w, i + 1)?;
                let ty = type_name(field.ty, field.type_name.as_deref());
                writeln!(w, "field {}: {ty}", field.name)?;
            }
            for method in methods {
                print_function(w, i + 1, method)?;
            }
        }
        StmtKind::Expr(expr) => print_expr(w, i, expr)?,
    }
    Ok(())
}

fn print_body(w: &mut impl Write, i: usize, body: &[Stmt]) -> std::io::Result<()> {
    for stmt in body {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_var_decl(w: &mut impl Write, i: usize, decl: &VarDecl) -> std::io::Result<()> {
    sp(w, i)?;
    let keyword = if decl.is_const { "const" } else { "var" };
    let ty = type_name(decl.ty, decl.type_name.as_deref());
    writeln!(w, "{keyword} {}: {ty}", decl.name)?;
    if let Some(init) = &decl.initializer {
        print_expr(w, i + 1, init)?;
    }
    Ok(())
}

fn print_function(w: &mut impl Write, i: usize, function: &FunctionDecl) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "func {}(", function.name)?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        let ty = type_name(param.ty, param.type_name.as_deref());
        write!(w, "{}: {ty}", param.name)?;
    }
    write!(
        w,
        "): {}",
        type_name(function.return_ty, function.return_type_name.as_deref())
    )?;
    if function.is_entry {
        write!(w, " @entrypoint")?;
    }
    writeln!(w)?;
    print_body(w, i + 1, &function.body)
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    match &expr.kind {
        ExprKind::Int(val) => writeln!(w, "int {val}")?,
        ExprKind::Float { value, ty } => writeln!(w, "float {value}: {ty}")?,
        ExprKind::String(val) => writeln!(w, "string {val:?}")?,
        ExprKind::Bool(val) => writeln!(w, "bool {val}")?,
        ExprKind::Format { segments, args } => {
            writeln!(w, "format {:?}", segments.join("{}"))?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Variable(name) => writeln!(w, "ident {name}")?,
        ExprKind::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        ExprKind::Unary {
            op,
            expr: inner_expr,
        } => {
            writeln!(w, "unary {op:?}")?;
            print_expr(w, i + 1, inner_expr)?;
        }
        ExprKind::Call { callee, args } => {
            match callee {
                Callee::Named(name) => writeln!(w, "call {name}")?,
                Callee::Expr(callee) => {
                    writeln!(w, "call")?;
                    print_expr(w, i + 1, callee)?;
                }
            }
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        ExprKind::Cast {
            expr: inner_expr,
            ty,
        } => {
            writeln!(w, "cast {ty}")?;
            print_expr(w, i + 1, inner_expr)?;
        }
        ExprKind::Module(path) => writeln!(w, "module {path}")?,
        ExprKind::Member { object, member } => {
            writeln!(w, "member {member}")?;
            print_expr(w, i + 1, object)?;
        }
        ExprKind::EnumValue { enum_name, member } => writeln!(w, "enum {enum_name}.{member}")?,
        ExprKind::StructLiteral { name, fields } => {
            writeln!(w, "struct {name}")?;
            for (field, value) in fields {
                sp(w, i + 1)?;
                writeln!(w, "field {field}")?;
                print_expr(w, i + 2, value)?;
            }
        }
    }
    Ok(())
}

fn type_name(ty: VarType, name: Option<&str>) -> String {
    match (ty, name) {
        (VarType::Struct, Some(name)) => name.to_owned(),
        (VarType::Module, Some(path)) => format!("module {path}"),
        _ => ty.to_string(),
    }
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

//! A small builder for textual LLVM IR.
//!
//! Only what the code generator needs is modelled: named struct types,
//! private string constants, globals, external declarations and functions
//! made of labelled basic blocks. Pointers are opaque (`ptr`).

use std::{
    collections::{BTreeSet, HashMap},
    fmt::{self, Write},
};

use crate::codegen::runtime::Helper;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    Int(u32),
    Float,
    Double,
    Ptr,
    Struct(String),
}

impl IrType {
    pub const BOOL: IrType = IrType::Int(1);

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float | IrType::Double)
    }

    /// The value stored by default into slots of this type.
    pub fn zero(&self) -> &'static str {
        match self {
            IrType::Int(1) => "false",
            IrType::Int(_) => "0",
            IrType::Float | IrType::Double => "0.0",
            IrType::Ptr => "null",
            IrType::Struct(_) => "zeroinitializer",
            IrType::Void => "",
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Float => f.write_str("float"),
            IrType::Double => f.write_str("double"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Struct(name) => write!(f, "%struct.{name}"),
        }
    }
}

/// An SSA value or constant together with its type.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub ty: IrType,
    pub repr: String,
}

impl Value {
    pub fn new(ty: IrType, repr: impl Into<String>) -> Value {
        Value {
            ty,
            repr: repr.into(),
        }
    }

    pub fn void() -> Value {
        Value::new(IrType::Void, "")
    }

    pub fn bool(value: bool) -> Value {
        Value::new(IrType::BOOL, if value { "true" } else { "false" })
    }

    pub fn int(bits: u32, value: impl fmt::Display) -> Value {
        if bits == 1 {
            let repr = value.to_string();
            return Value::bool(repr != "0" && repr != "false");
        }
        Value::new(IrType::Int(bits), value.to_string())
    }

    /// Float constants are written as the hexadecimal bits of a double,
    /// which is the only form LLVM accepts for every value of both widths.
    pub fn float(ty: IrType, value: f64) -> Value {
        let value = if ty == IrType::Float {
            f64::from(value as f32)
        } else {
            value
        };
        Value::new(ty, format!("0x{:016X}", value.to_bits()))
    }
}

impl fmt::Display for Value {
    /// Renders `type repr`, the operand form used by most instructions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.repr)
    }
}

#[derive(Debug)]
struct Block {
    label: String,
    instructions: Vec<String>,
    terminated: bool,
}

/// Index of a basic block within its function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockId(usize);

#[derive(Debug)]
pub struct Function {
    symbol: String,
    ret: IrType,
    params: Vec<(IrType, String)>,
    allocas: Vec<String>,
    blocks: Vec<Block>,
    current: usize,
    next_tmp: usize,
    next_label: usize,
}

impl Function {
    pub fn new(symbol: impl Into<String>, ret: IrType, params: Vec<(IrType, String)>) -> Function {
        Function {
            symbol: symbol.into(),
            ret,
            params,
            allocas: Vec::new(),
            blocks: vec![Block {
                label: "entry".into(),
                instructions: Vec::new(),
                terminated: false,
            }],
            current: 0,
            next_tmp: 0,
            next_label: 0,
        }
    }

    /// Appends an instruction to the current block. Instructions after a
    /// terminator are unreachable and dropped.
    pub fn emit(&mut self, instruction: impl fmt::Display) {
        let block = &mut self.blocks[self.current];
        if !block.terminated {
            block.instructions.push(instruction.to_string());
        }
    }

    /// Emits `%tmp = <rhs>` and returns the new value.
    pub fn assign(&mut self, ty: IrType, rhs: impl fmt::Display) -> Value {
        let name = format!("%t{}", self.next_tmp);
        self.next_tmp += 1;
        self.emit(format_args!("{name} = {rhs}"));
        Value::new(ty, name)
    }

    pub fn terminate(&mut self, instruction: impl fmt::Display) {
        self.emit(instruction);
        self.blocks[self.current].terminated = true;
    }

    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current].terminated
    }

    /// Reserves a stack slot in the entry block, regardless of where the
    /// builder currently is, and returns its address.
    pub fn alloca(&mut self, ty: &IrType, hint: &str) -> String {
        let name = format!("%{hint}.addr{}", self.allocas.len());
        self.allocas.push(format!("{name} = alloca {ty}"));
        name
    }

    pub fn new_block(&mut self, hint: &str) -> BlockId {
        let label = format!("{hint}.{}", self.next_label);
        self.next_label += 1;
        self.blocks.push(Block {
            label,
            instructions: Vec::new(),
            terminated: false,
        });
        BlockId(self.blocks.len() - 1)
    }

    pub fn position_at(&mut self, block: BlockId) {
        self.current = block.0;
    }

    pub fn current_block(&self) -> BlockId {
        BlockId(self.current)
    }

    pub fn label(&self, block: BlockId) -> &str {
        &self.blocks[block.0].label
    }

    pub fn br(&mut self, target: BlockId) {
        let label = self.label(target).to_owned();
        self.terminate(format_args!("br label %{label}"));
    }

    pub fn cond_br(&mut self, condition: &str, then: BlockId, otherwise: BlockId) {
        let then = self.label(then).to_owned();
        let otherwise = self.label(otherwise).to_owned();
        self.terminate(format_args!(
            "br i1 {condition}, label %{then}, label %{otherwise}"
        ));
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let params = self
            .params
            .iter()
            .map(|(ty, name)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");
        _ = writeln!(out, "define {} @{}({params}) {{", self.ret, self.symbol);
        for (idx, block) in self.blocks.iter().enumerate() {
            if idx > 0 {
                _ = writeln!(out);
            }
            _ = writeln!(out, "{}:", block.label);
            if idx == 0 {
                for alloca in &self.allocas {
                    _ = writeln!(out, "  {alloca}");
                }
            }
            for instruction in &block.instructions {
                _ = writeln!(out, "  {instruction}");
            }
            // Blocks nobody branches out of, such as the merge point after
            // an if whose arms all return.
            if !block.terminated {
                _ = writeln!(out, "  unreachable");
            }
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Default)]
pub struct Module {
    target_triple: String,
    struct_types: Vec<(String, Vec<IrType>)>,
    strings: HashMap<String, String>,
    string_defs: Vec<String>,
    globals: Vec<String>,
    helper_globals: BTreeSet<String>,
    declarations: BTreeSet<String>,
    helpers: Vec<&'static str>,
    functions: Vec<String>,
}

impl Module {
    pub fn new(target_triple: impl Into<String>) -> Module {
        Module {
            target_triple: target_triple.into(),
            ..Module::default()
        }
    }

    pub fn add_struct_type(&mut self, name: &str, fields: Vec<IrType>) {
        self.struct_types.push((name.to_owned(), fields));
    }

    /// Interns a NUL-terminated string constant, returning a pointer to it.
    pub fn string_constant(&mut self, text: &str) -> Value {
        if let Some(name) = self.strings.get(text) {
            return Value::new(IrType::Ptr, name.clone());
        }
        let name = format!("@.str.{}", self.string_defs.len());
        let len = text.len() + 1;
        self.string_defs.push(format!(
            "{name} = private unnamed_addr constant [{len} x i8] c\"{}\\00\"",
            escape(text)
        ));
        self.strings.insert(text.to_owned(), name.clone());
        Value::new(IrType::Ptr, name)
    }

    pub fn add_global(&mut self, definition: String) {
        self.globals.push(definition);
    }

    /// Adds an external declaration such as `declare i32 @puts(ptr)`.
    pub fn declare(&mut self, declaration: &str) {
        self.declarations.insert(declaration.to_owned());
    }

    /// Pulls a runtime helper (and what it depends on) into the module.
    pub fn require(&mut self, helper: &Helper) {
        if self.helpers.contains(&helper.body) {
            return;
        }
        self.helpers.push(helper.body);
        for global in helper.globals {
            self.helper_globals.insert((*global).to_owned());
        }
        for declaration in helper.declarations {
            self.declare(declaration);
        }
    }

    pub fn add_function(&mut self, function: &Function) {
        self.functions.push(function.render());
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        _ = writeln!(out, "; ModuleID = 'flint'");
        _ = writeln!(out, "target triple = \"{}\"", self.target_triple);

        let struct_types = self
            .struct_types
            .iter()
            .map(|(name, fields)| {
                let fields = fields.iter().map(ToString::to_string).collect::<Vec<_>>();
                format!("%struct.{name} = type {{ {} }}", fields.join(", "))
            })
            .collect();
        let constants = self
            .string_defs
            .iter()
            .chain(&self.helper_globals)
            .cloned()
            .collect();
        let declarations = self.declarations.iter().cloned().collect();
        let sections: [Vec<String>; 4] =
            [struct_types, constants, self.globals.clone(), declarations];
        for section in sections.iter().filter(|s| !s.is_empty()) {
            _ = writeln!(out);
            for line in section {
                _ = writeln!(out, "{line}");
            }
        }

        let functions = self.functions.iter().map(String::as_str);
        for function in self.helpers.iter().copied().chain(functions) {
            _ = writeln!(out);
            out.push_str(function);
        }
        out
    }
}

/// Escapes a string for a `c"..."` constant.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        if (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') || byte == b' ' {
            out.push(char::from(byte));
        } else {
            _ = write!(out, "\\{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_rendering() {
        let mut f = Function::new("add", IrType::Int(32), vec![(IrType::Int(32), "%a".into())]);
        let slot = f.alloca(&IrType::Int(32), "x");
        f.emit(format_args!("store i32 %a, ptr {slot}"));
        let loaded = f.assign(IrType::Int(32), format_args!("load i32, ptr {slot}"));
        let exit = f.new_block("exit");
        f.br(exit);
        f.emit("add i32 1, 2");
        f.position_at(exit);
        f.terminate(format_args!("ret {loaded}"));

        let expected = indoc! {"
            define i32 @add(i32 %a) {
            entry:
              %x.addr0 = alloca i32
              store i32 %a, ptr %x.addr0
              %t0 = load i32, ptr %x.addr0
              br label %exit.0

            exit.0:
              ret i32 %t0
            }
        "};
        assert_eq!(f.render(), expected);
    }

    #[test]
    fn test_string_constants_are_interned() {
        let mut m = Module::new("x86_64-unknown-linux-gnu");
        let a = m.string_constant("x=\"1\"\n");
        let b = m.string_constant("x=\"1\"\n");
        assert_eq!(a, b);
        assert_eq!(a.repr, "@.str.0");
        assert!(m
            .render()
            .contains(r#"@.str.0 = private unnamed_addr constant [7 x i8] c"x=\221\22\0A\00""#));
    }

    #[test]
    fn test_float_constants() {
        assert_eq!(Value::float(IrType::Double, 1.0).repr, "0x3FF0000000000000");
        assert_eq!(Value::float(IrType::Float, 0.1).repr, "0x3FB99999A0000000");
    }

    #[test]
    fn test_unterminated_block_gets_unreachable() {
        let mut f = Function::new("f", IrType::Void, vec![]);
        let dead = f.new_block("dead");
        f.terminate("ret void");
        f.position_at(dead);
        assert!(f.render().ends_with("dead.0:\n  unreachable\n}\n"));
    }
}

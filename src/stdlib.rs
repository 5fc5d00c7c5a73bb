//! Names provided by the standard library: free builtin functions, the
//! `std` module tree and its members.
//!
//! The tables are immutable `phf` maps, so there is nothing to initialize and
//! nothing to share mutably. Emitting the actual calls is up to the code
//! generator, which maps each [`Builtin`] to backend code.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Println,
    Readln,
    ReadInt,
    /// `@dec`, decimal rendering of an integer.
    Dec,
    /// `@bin`, binary rendering of an integer.
    Bin,
    Sqrt,
    Pow,
    Abs,
    Min,
    Max,
    Floor,
    Ceil,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Member {
    Function { builtin: Builtin, arity: usize },
    Constant(f64),
}

const fn function(builtin: Builtin, arity: usize) -> Member {
    Member::Function { builtin, arity }
}

static FUNCTIONS: phf::Map<&'static str, (Builtin, usize)> = phf::phf_map! {
    "print" => (Builtin::Print, 1),
    "println" => (Builtin::Println, 1),
    "readln" => (Builtin::Readln, 0),
    "read_int" => (Builtin::ReadInt, 0),
    "@dec" => (Builtin::Dec, 1),
    "@bin" => (Builtin::Bin, 1),
    "@print" => (Builtin::Print, 1),
    "@println" => (Builtin::Println, 1),
};

static MODULES: phf::Set<&'static str> = phf::phf_set! {
    "std",
    "std.io",
    "std.math",
};

/// Keyed by `module.member`.
static MEMBERS: phf::Map<&'static str, Member> = phf::phf_map! {
    "std.io.print" => function(Builtin::Print, 1),
    "std.io.println" => function(Builtin::Println, 1),
    "std.io.readln" => function(Builtin::Readln, 0),
    "std.io.read_int" => function(Builtin::ReadInt, 0),
    "std.math.sqrt" => function(Builtin::Sqrt, 1),
    "std.math.pow" => function(Builtin::Pow, 2),
    "std.math.abs" => function(Builtin::Abs, 1),
    "std.math.min" => function(Builtin::Min, 2),
    "std.math.max" => function(Builtin::Max, 2),
    "std.math.floor" => function(Builtin::Floor, 1),
    "std.math.ceil" => function(Builtin::Ceil, 1),
    "std.math.PI" => Member::Constant(std::f64::consts::PI),
    "std.math.E" => Member::Constant(std::f64::consts::E),
};

pub fn is_module(path: &str) -> bool {
    MODULES.contains(path)
}

/// Resolves a call site by name and argument count.
///
/// Returns `Ok(None)` for names the standard library does not provide, and
/// an error message when the name is known but the arity is wrong.
pub fn lookup_function(name: &str, argc: usize) -> Result<Option<Builtin>, String> {
    match FUNCTIONS.get(name) {
        None => Ok(None),
        Some(&(builtin, arity)) if arity == argc => Ok(Some(builtin)),
        Some(&(_, arity)) => Err(arity_message(name, arity, argc)),
    }
}

pub fn lookup_member(module: &str, member: &str) -> Option<Member> {
    MEMBERS.get(format!("{module}.{member}").as_str()).copied()
}

pub fn arity_message(name: &str, expected: usize, actual: usize) -> String {
    let plural = if expected == 1 { "" } else { "s" };
    format!("function `{name}` expects {expected} argument{plural}, but got {actual}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_function_lookup() {
        assert_eq!(lookup_function("println", 1), Ok(Some(Builtin::Println)));
        assert_eq!(lookup_function("@bin", 1), Ok(Some(Builtin::Bin)));
        assert_eq!(lookup_function("nope", 3), Ok(None));
        assert_eq!(
            lookup_function("readln", 2),
            Err("function `readln` expects 0 arguments, but got 2".to_string())
        );
    }

    #[test]
    fn test_module_members() {
        assert!(is_module("std"));
        assert!(is_module("std.math"));
        assert!(!is_module("std.fs"));
        assert_eq!(
            lookup_member("std.math", "pow"),
            Some(Member::Function {
                builtin: Builtin::Pow,
                arity: 2
            })
        );
        assert_eq!(
            lookup_member("std.math", "PI"),
            Some(Member::Constant(std::f64::consts::PI))
        );
        assert_eq!(lookup_member("std.io", "sqrt"), None);
    }
}

//! Runtime support functions, written directly in IR on top of libc and
//! pulled into a module only when generated code calls them.

/// An internal IR function with the globals and external declarations its
/// body refers to.
pub struct Helper {
    pub symbol: &'static str,
    pub globals: &'static [&'static str],
    pub declarations: &'static [&'static str],
    pub body: &'static str,
}

const MALLOC: &str = "declare ptr @malloc(i64)";
const SNPRINTF: &str = "declare i32 @snprintf(ptr, i64, ptr, ...)";
const SCANF: &str = "declare i32 @scanf(ptr, ...)";
const FMT_I64: &str = r#"@.fmt.i64 = private unnamed_addr constant [5 x i8] c"%lld\00""#;

pub const I64_TO_STR: Helper = Helper {
    symbol: "@flint.i64_to_str",
    globals: &[FMT_I64],
    declarations: &[MALLOC, SNPRINTF],
    body: "\
define internal ptr @flint.i64_to_str(i64 %v) {
entry:
  %buf = call ptr @malloc(i64 32)
  %n = call i32 (ptr, i64, ptr, ...) @snprintf(ptr %buf, i64 32, ptr @.fmt.i64, i64 %v)
  ret ptr %buf
}
",
};

pub const U64_TO_STR: Helper = Helper {
    symbol: "@flint.u64_to_str",
    globals: &[r#"@.fmt.u64 = private unnamed_addr constant [5 x i8] c"%llu\00""#],
    declarations: &[MALLOC, SNPRINTF],
    body: "\
define internal ptr @flint.u64_to_str(i64 %v) {
entry:
  %buf = call ptr @malloc(i64 32)
  %n = call i32 (ptr, i64, ptr, ...) @snprintf(ptr %buf, i64 32, ptr @.fmt.u64, i64 %v)
  ret ptr %buf
}
",
};

pub const F64_TO_STR: Helper = Helper {
    symbol: "@flint.f64_to_str",
    globals: &[r#"@.fmt.f64 = private unnamed_addr constant [3 x i8] c"%g\00""#],
    declarations: &[MALLOC, SNPRINTF],
    body: "\
define internal ptr @flint.f64_to_str(double %v) {
entry:
  %buf = call ptr @malloc(i64 64)
  %n = call i32 (ptr, i64, ptr, ...) @snprintf(ptr %buf, i64 64, ptr @.fmt.f64, double %v)
  ret ptr %buf
}
",
};

pub const BOOL_TO_STR: Helper = Helper {
    symbol: "@flint.bool_to_str",
    globals: &[
        r#"@.str.true = private unnamed_addr constant [5 x i8] c"true\00""#,
        r#"@.str.false = private unnamed_addr constant [6 x i8] c"false\00""#,
    ],
    declarations: &[],
    body: "\
define internal ptr @flint.bool_to_str(i1 %v) {
entry:
  %s = select i1 %v, ptr @.str.true, ptr @.str.false
  ret ptr %s
}
",
};

/// Allocates a buffer holding `a` followed by `b`.
pub const CONCAT: Helper = Helper {
    symbol: "@flint.concat",
    globals: &[],
    declarations: &[
        MALLOC,
        "declare i64 @strlen(ptr)",
        "declare ptr @strcpy(ptr, ptr)",
        "declare ptr @strcat(ptr, ptr)",
    ],
    body: "\
define internal ptr @flint.concat(ptr %a, ptr %b) {
entry:
  %len.a = call i64 @strlen(ptr %a)
  %len.b = call i64 @strlen(ptr %b)
  %len = add i64 %len.a, %len.b
  %size = add i64 %len, 1
  %buf = call ptr @malloc(i64 %size)
  %copied = call ptr @strcpy(ptr %buf, ptr %a)
  %joined = call ptr @strcat(ptr %buf, ptr %b)
  ret ptr %buf
}
",
};

/// Renders the low `width` bits of `v`, most significant first.
pub const BIN: Helper = Helper {
    symbol: "@flint.bin",
    globals: &[],
    declarations: &[MALLOC],
    body: "\
define internal ptr @flint.bin(i64 %v, i64 %width) {
entry:
  %size = add i64 %width, 1
  %buf = call ptr @malloc(i64 %size)
  br label %cond

cond:
  %i = phi i64 [ 0, %entry ], [ %next, %body ]
  %done = icmp uge i64 %i, %width
  br i1 %done, label %end, label %body

body:
  %rest = sub i64 %width, %i
  %shift = sub i64 %rest, 1
  %shifted = lshr i64 %v, %shift
  %bit = and i64 %shifted, 1
  %ascii = add i64 %bit, 48
  %digit = trunc i64 %ascii to i8
  %slot = getelementptr inbounds i8, ptr %buf, i64 %i
  store i8 %digit, ptr %slot
  %next = add i64 %i, 1
  br label %cond

end:
  %nul = getelementptr inbounds i8, ptr %buf, i64 %width
  store i8 0, ptr %nul
  ret ptr %buf
}
",
};

pub const PRINT: Helper = Helper {
    symbol: "@flint.print",
    globals: &[r#"@.fmt.s = private unnamed_addr constant [3 x i8] c"%s\00""#],
    declarations: &["declare i32 @printf(ptr, ...)"],
    body: "\
define internal void @flint.print(ptr %s) {
entry:
  %n = call i32 (ptr, ...) @printf(ptr @.fmt.s, ptr %s)
  ret void
}
",
};

pub const PRINTLN: Helper = Helper {
    symbol: "@flint.println",
    globals: &[],
    declarations: &["declare i32 @puts(ptr)"],
    body: "\
define internal void @flint.println(ptr %s) {
entry:
  %n = call i32 @puts(ptr %s)
  ret void
}
",
};

/// Reads one line from standard input, without its line break.
pub const READLN: Helper = Helper {
    symbol: "@flint.readln",
    globals: &[r#"@.fmt.line = private unnamed_addr constant [11 x i8] c" %1023[^\0A]\00""#],
    declarations: &[MALLOC, SCANF],
    body: "\
define internal ptr @flint.readln() {
entry:
  %buf = call ptr @malloc(i64 1024)
  store i8 0, ptr %buf
  %n = call i32 (ptr, ...) @scanf(ptr @.fmt.line, ptr %buf)
  ret ptr %buf
}
",
};

/// Reads a signed integer from standard input, `0` when none could be read.
pub const READ_INT: Helper = Helper {
    symbol: "@flint.read_int",
    globals: &[FMT_I64],
    declarations: &[SCANF],
    body: "\
define internal i64 @flint.read_int() {
entry:
  %slot = alloca i64
  store i64 0, ptr %slot
  %n = call i32 (ptr, ...) @scanf(ptr @.fmt.i64, ptr %slot)
  %v = load i64, ptr %slot
  ret i64 %v
}
",
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[&Helper] = &[
        &I64_TO_STR,
        &U64_TO_STR,
        &F64_TO_STR,
        &BOOL_TO_STR,
        &CONCAT,
        &BIN,
        &PRINT,
        &PRINTLN,
        &READLN,
        &READ_INT,
    ];

    #[test]
    fn test_helpers_define_their_symbol() {
        for helper in ALL {
            let header = helper.body.lines().next().unwrap();
            assert!(header.starts_with("define internal "), "{header}");
            assert!(header.contains(&format!("{}(", helper.symbol)), "{header}");
            assert!(helper.body.ends_with("}\n"));
        }
    }

    #[test]
    fn test_helper_constants_are_sized() {
        for global in ALL.iter().flat_map(|h| h.globals) {
            let (size, rest) = global
                .split_once(" x i8] c\"")
                .and_then(|(head, rest)| Some((head.rsplit_once('[')?.1, rest)))
                .unwrap();
            let text = rest.trim_end_matches('"');
            // Every `\XX` escape is a single byte.
            let len = text.len() - 2 * text.matches('\\').count();
            assert_eq!(size.parse::<usize>().unwrap(), len, "{global}");
        }
    }
}

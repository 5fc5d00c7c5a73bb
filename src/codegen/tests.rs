use crate::util::test_utils::tree_tests;

tree_tests!(
    use codegen;

    fn test_missing_return_after_if() {
        let program = "func f(a: int32): int32\n  if (a > 0) then\n    return 1;\n  end\nend\n";
        let expected_errors = &[
            "1:1: missing return in function `f`: it must end with a return of int32",
        ];
    }

    fn test_if_else_both_returning() {
        let program =
            "func f(a: int32): int32\n  if (a > 0) then\n    return 1;\n  else\n    return 2;\n  end\nend\n";
        let ir_contains = &[
            "define i32 @f.f(i32 %arg.a)",
            "icmp sgt i32 %t0, 0",
            "ret i32 1",
            "ret i32 2",
            "define i32 @main()",
            "ret i32 0",
        ];
    }

    fn test_for_bound_out_of_range() {
        let program = "for (var i: int8 = 0; i < 500; i++) do\nend\n";
        let expected_errors = &[
            "1:23: loop bound never reached: value 500 is out of bounds for int8 [-128, 127]",
        ];
    }

    fn test_assign_to_constant() {
        let program = "const x = 1;\nfunc main(): int32\n  x = 2;\n  return 0;\nend\n";
        let expected_errors = &["3:3: cannot assign to `x`: it is constant"];
    }

    fn test_assign_to_uint0() {
        let program = "func main()\n  var flag = true;\n  flag = false;\nend\n";
        let expected_errors = &["3:3: cannot assign to `flag`: uint0 values are read-only"];
    }

    fn test_illegal_cast() {
        let program = "func main()\n  var s = \"a\";\n  var n = s as int32;\nend\n";
        let expected_errors = &["3:11: cannot cast string to int32"];
    }

    fn test_type_mismatch() {
        let program = "func main()\n  var n: int32 = \"a\";\nend\n";
        let expected_errors = &["2:18: type mismatch: expected int32, found string"];
    }

    fn test_literal_out_of_bounds() {
        let program = "func main()\n  var x: int8 = 300;\nend\n";
        let expected_errors = &["2:17: value 300 is out of bounds for int8 [-128, 127]"];
    }

    fn test_unknown_variable() {
        let program = "func main()\n  y = 1;\nend\n";
        let expected_errors = &["2:3: unknown variable `y`"];
    }

    fn test_stop_outside_loop() {
        let program = "func main()\n  STOP;\nend\n";
        let expected_errors = &["2:3: `STOP` used outside of a loop"];
    }

    fn test_user_function_arity() {
        let program = "func f(a: int32) end\nfunc main()\n  f();\nend\n";
        let expected_errors = &["3:3: function `f` expects 1 argument, but got 0"];
    }

    fn test_string_concatenation() {
        let program = "func main()\n  println(\"x=\" + 5);\nend\n";
        let ir_contains = &[
            r#"@.str.0 = private unnamed_addr constant [3 x i8] c"x=\00""#,
            "define internal ptr @flint.i64_to_str(i64 %v)",
            "define void @f.main()",
            "%t0 = sext i32 5 to i64",
            "%t1 = call ptr @flint.i64_to_str(i64 %t0)",
            "%t2 = call ptr @flint.concat(ptr @.str.0, ptr %t1)",
            "call void @flint.println(ptr %t2)",
            "define i32 @main()",
            "call void @f.main()",
            "ret i32 0",
        ];
    }

    fn test_entry_point_wrapper() {
        let program = "@entrypoint\nfunc start(): bool\n  return true;\nend\n";
        let ir_contains = &[
            "define i1 @f.start()",
            "ret i1 true",
            "define i32 @main()",
            "%t0 = call i1 @f.start()",
            "%t1 = zext i1 %t0 to i32",
            "ret i32 %t1",
        ];
    }

    fn test_implicit_main() {
        let program = "var x: int32 = 2;\nx = x * 3;\nprintln(x);\n";
        let ir_contains = &[
            "@g.x = internal global i32 2",
            "define i32 @main()",
            "%t0 = load i32, ptr @g.x",
            "%t1 = mul i32 %t0, 3",
            "store i32 %t1, ptr @g.x",
            "call ptr @flint.i64_to_str(i64 %t3)",
            "call void @flint.println(ptr %t4)",
            "ret i32 0",
        ];
    }

    fn test_enum_values() {
        let program = "enum Color\n  Red,\n  Green = 1 << 4,\n  Blue\nend\nfunc main(): int32\n  return Color.Blue;\nend\n";
        let ir_contains = &["define i32 @main()", "ret i32 17"];
    }

    fn test_global_needs_constant_initializer() {
        let program = "func f(): int32\n  return 1;\nend\nvar x: int32 = f();\n";
        let expected_errors = &[
            "4:16: global `x` must be initialized with a compile-time constant of type int32",
        ];
    }

    fn test_struct_fields() {
        let program = "struct Point\n  x: int32;\n  y: int32;\nend\nfunc main(): int32\n  var p = Point { x: 1, y: 2 };\n  p.x = p.y + 40;\n  return p.x;\nend\n";
        let ir_contains = &[
            "%struct.Point = type { i32, i32 }",
            "define i32 @main()",
            "store %struct.Point zeroinitializer, ptr %lit.addr0",
            "getelementptr inbounds %struct.Point, ptr %lit.addr0, i32 0, i32 0",
            "store i32 1, ptr",
            "load %struct.Point, ptr %lit.addr0",
            "getelementptr inbounds %struct.Point, ptr %p.addr1, i32 0, i32 1",
            "add i32",
            "ret i32",
        ];
    }

    fn test_struct_method_call() {
        let program = "struct Point\n  x: int32;\n  y: int32;\n  func sum(): int32 return self.x + self.y; end\nend\nfunc main(): int32\n  var p = Point { x: 1, y: 2 };\n  return p.sum();\nend\n";
        let ir_contains = &[
            "define i32 @f.Point.sum(ptr %arg.self)",
            "getelementptr inbounds %struct.Point, ptr %arg.self, i32 0, i32 0",
            "define i32 @main()",
            "call i32 @f.Point.sum(ptr %p.addr1)",
        ];
    }

    fn test_loop_with_short_circuit_and_next() {
        let program = "func main()\n  var i: int32 = 0;\n  while (i < 10 && i != 5) do\n    i++;\n    if (i == 3) then\n      NEXT;\n    end\n  end\nend\n";
        let ir_contains = &[
            "br label %while.cond.0",
            "while.cond.0:",
            "br i1",
            "and.rhs.3:",
            "phi i1 [ false, %while.cond.0 ], [",
            "if.then.5:",
            "br label %while.cond.0",
        ];
    }

    fn test_math_module_and_alias() {
        let program = "const io = std.io;\nfunc main()\n  var r: float64 = std.math.sqrt(16);\n  io.println(r);\nend\n";
        let ir_contains = &[
            "declare double @sqrt(double)",
            "call double @sqrt(double 0x4030000000000000)",
            "call ptr @flint.f64_to_str(double",
            "call void @flint.println(ptr",
        ];
    }

    fn test_function_inside_block_is_rejected() {
        let program = "func main()\n  if (true) then\n    func g() end\n  end\nend\n";
        let expected_errors = &["3:5: function `g` must be declared at the top level"];
    }

    fn test_assign_to_constant_alias() {
        let program = "const io = std.io;\nfunc main(): int32\n  io = std.math;\n  return 0;\nend\n";
        let expected_errors = &["3:3: cannot assign to `io`: it is constant"];
    }

    fn test_reassign_variable_alias() {
        let program = "var m = std.io;\nfunc main()\n  m = std.math;\n  println(m.sqrt(4));\nend\n";
        let ir_contains = &["call double @sqrt(double 0x4010000000000000)"];
    }

    fn test_alias_does_not_outlive_its_function() {
        let program = "func a()\n  const m = std.math;\nend\nfunc main(): int32\n  var x: float64 = m.sqrt(4);\n  return 0;\nend\n";
        let expected_errors = &["5:20: unknown variable `m`"];
    }

    fn test_alias_does_not_outlive_its_block() {
        let program = "func main()\n  if (true) then\n    const m = std.math;\n  end\n  m.sqrt(4);\nend\n";
        let expected_errors = &["5:3: unknown variable `m`"];
    }

    fn test_nested_field_of_constant_struct() {
        let program = "struct In\n  x: int32;\nend\nstruct Out\n  i: In;\nend\nconst o: Out = Out { i: In { x: 1 } };\nfunc main(): int32\n  o.i.x = 5;\n  return 0;\nend\n";
        let expected_errors = &["9:3: cannot assign to field `x`: `o` is constant"];
    }

    fn test_negative_float_global() {
        let program = "var f: float64 = -1.5;\nprintln(f);\n";
        let ir_contains = &[
            "@g.f = internal global double 0xBFF8000000000000",
            "%t0 = load double, ptr @g.f",
            "call ptr @flint.f64_to_str(double %t0)",
        ];
    }

    fn test_negative_float_constant_keeps_float_type() {
        let program = "const x = -1.5;\nfunc main()\n  const y = -2.5;\n  println(x + y);\nend\n";
        let ir_contains = &[
            "@g.x = internal constant double 0xBFF8000000000000",
            "%t0 = fneg double 0x4004000000000000",
            "store double %t0, ptr %y.addr0",
            "fadd double",
            "call ptr @flint.f64_to_str(double",
        ];
    }

    fn test_unsigned_division_and_shifts() {
        let program = "func q(a: uint32, b: uint32): uint32 return a / b; end\nfunc r(a: uint32, b: uint32): uint32 return a % b; end\nfunc s(a: uint32, b: uint32): uint32 return a >> b; end\nfunc t(a: int32, b: int32): int32 return a >> b; end\nfunc u(a: int32, b: int32): int32 return a / b; end\n";
        let ir_contains = &[
            "define i32 @f.q(i32 %arg.a, i32 %arg.b)",
            "%t2 = udiv i32 %t0, %t1",
            "define i32 @f.r(i32 %arg.a, i32 %arg.b)",
            "%t2 = urem i32 %t0, %t1",
            "define i32 @f.s(i32 %arg.a, i32 %arg.b)",
            "%t2 = lshr i32 %t0, %t1",
            "define i32 @f.t(i32 %arg.a, i32 %arg.b)",
            "%t2 = ashr i32 %t0, %t1",
            "define i32 @f.u(i32 %arg.a, i32 %arg.b)",
            "%t2 = sdiv i32 %t0, %t1",
        ];
    }

    fn test_float_bitwise_goes_through_int64() {
        let program = "func f(a: float64, b: float64): float64 return a & b; end\nfunc g(a: float64, b: float64): float64 return a << b; end\n";
        let ir_contains = &[
            "define double @f.f(double %arg.a, double %arg.b)",
            "%t2 = fptosi double %t0 to i64",
            "%t3 = fptosi double %t1 to i64",
            "%t4 = and i64 %t2, %t3",
            "%t5 = sitofp i64 %t4 to double",
            "ret double %t5",
            "define double @f.g(double %arg.a, double %arg.b)",
            "%t4 = shl i64 %t2, %t3",
            "%t5 = sitofp i64 %t4 to double",
        ];
    }

    fn test_numeric_casts() {
        let program = "func f(a: int32): float64 return a as float64; end\nfunc g(a: float64): int32 return a as int32; end\nfunc h(a: float32): float64 return a as float64; end\nfunc k(a: float64): float32 return a as float32; end\n";
        let ir_contains = &[
            "%t1 = sitofp i32 %t0 to double",
            "ret double %t1",
            "%t1 = fptosi double %t0 to i32",
            "ret i32 %t1",
            "%t1 = fpext float %t0 to double",
            "ret double %t1",
            "%t1 = fptrunc double %t0 to float",
            "ret float %t1",
        ];
    }

    fn test_loop_local_gets_one_slot_in_entry_block() {
        let program = "func main()\n  var i: int32 = 0;\n  while (i < 3) do\n    var j: int32 = i;\n    i++;\n  end\nend\n";
        let ir_contains = &[
            "define void @f.main()",
            "entry:",
            "%i.addr0 = alloca i32",
            "%j.addr1 = alloca i32",
            "store i32 0, ptr %i.addr0",
            "while.cond.0:",
            "while.body.1:",
            "%t2 = load i32, ptr %i.addr0",
            "store i32 %t2, ptr %j.addr1",
        ];
    }

    fn test_main_by_name_next_to_other_functions() {
        let program = "func helper(): int32 return 4; end\nfunc main(): int32 return helper(); end\n";
        let ir_contains = &[
            "define i32 @f.helper()",
            "ret i32 4",
            "define i32 @main()",
            "%t0 = call i32 @f.helper()",
            "ret i32 %t0",
        ];
    }
);

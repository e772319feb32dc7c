//! End-to-end scenarios. There is no assembler or linker available in
//! this environment, so these assert on the *structure* of the emitted
//! assembly (sections, labels, instruction shapes) rather than on a
//! process exit code, matching the contract in `assembly output
//! contract` and the scenario table.

fn compile(src: &str) -> String {
    subc::compile(src).expect("program compiles")
}

#[test]
fn every_translation_unit_opens_with_intel_syntax_and_one_data_one_text_section() {
    let asm = compile("int main() { return 5+20-4; }");
    let lines: Vec<&str> = asm.lines().collect();
    assert_eq!(lines[0], ".intel_syntax noprefix");
    assert_eq!(asm.matches(".data").count(), 1);
    assert_eq!(asm.matches(".text").count(), 1);
    assert!(asm.contains("main:\n"));
}

#[test]
fn constant_folding_chain_emits_three_pushes_and_no_calls() {
    let asm = compile("int main() { return 5+20-4; }");
    assert_eq!(asm.matches("  push 5\n").count(), 1);
    assert_eq!(asm.matches("  push 20\n").count(), 1);
    assert_eq!(asm.matches("  push 4\n").count(), 1);
    assert!(!asm.contains("call"));
}

#[test]
fn for_loop_with_initialized_locals_has_one_begin_and_end_label() {
    let asm = compile(
        "int main() { int i=0; int j=0; for (i=0; i<=10; i=i+1) j=i+j; return j; }",
    );
    assert!(asm.contains(".L.begin.1:\n"));
    assert!(asm.contains(".L.end.1:\n"));
    // `i<=10` desugars to `Le`, which sets *and widens* a byte.
    assert!(asm.contains("  setle al\n"));
}

#[test]
fn recursive_call_is_self_referential_and_pads_for_alignment() {
    let asm = compile(
        "int main() { return fib(9); } int fib(int x) { if (x<=1) return 1; return fib(x-1)+fib(x-2); }",
    );
    assert_eq!(asm.matches("  call fib\n").count(), 2);
    assert!(asm.contains(".global fib\n"));
    assert!(asm.contains(".L.return.fib:\n"));
    assert!(asm.contains("  and rax, 15\n"));
}

#[test]
fn pointer_parameter_dereference_reads_through_the_argument_register() {
    let asm = compile(
        "int main() { int x=3; int y=5; return foo(&x,y); } int foo(int *x, int y) { return *x+y; }",
    );
    assert!(asm.contains("  mov [rbp-8], rdi\n"));
    assert!(asm.contains("  mov [rbp-16], rsi\n"));
    assert!(asm.contains("  call foo\n"));
}

#[test]
fn two_dimensional_array_decays_to_a_flat_pointer() {
    let asm = compile("int main() { int x[2][3]; int *y=x; y[1]=1; return x[0][1]; }");
    // Indexing a `int[2][3]` through a decayed `int*` scales by
    // `sizeof(int)` regardless of how many dimensions the source had.
    assert!(asm.contains("imul rdi, 8") || asm.contains("imul rax, 8"));
}

#[test]
fn struct_field_stores_use_the_parser_assigned_offset() {
    let asm = compile("int main() { struct {int a; int b;} x; x.a=1; x.b=2; return x.a; }");
    assert!(asm.contains("  add rax, 0\n"));
    assert!(asm.contains("  add rax, 8\n"));
}

#[test]
fn string_indexing_reads_a_byte_out_of_the_data_section() {
    let asm = compile(r#"int main() { return "abc"[1]; }"#);
    assert!(asm.contains(".L.data.0:\n"));
    assert!(asm.contains("  .byte 97\n"));
    assert!(asm.contains("  .byte 98\n"));
    assert!(asm.contains("  .byte 99\n"));
    assert!(asm.contains("  movsx rax, byte ptr [rax]\n"));
}

#[test]
fn empty_function_body_still_has_a_well_formed_prologue_and_epilogue() {
    let asm = compile("int main() { }");
    assert!(asm.contains("  push rbp\n"));
    assert!(asm.contains("  sub rsp, 0\n"));
    assert!(asm.contains(".L.return.main:\n"));
}

#[test]
fn bare_for_with_no_clauses_has_no_condition_check() {
    let asm = compile("int main() { for (;;) return 1; }");
    let begin_to_end = asm
        .split(".L.begin.1:\n")
        .nth(1)
        .and_then(|s| s.split(".L.end").next())
        .unwrap_or("");
    assert!(!begin_to_end.contains("cmp rax, 0"));
}

#[test]
fn nested_block_locals_are_still_counted_in_the_frame() {
    let asm = compile("int main() { int x; { int x; } return x; }");
    assert!(asm.contains("  sub rsp, 16\n"));
}

#[test]
fn char_local_round_trips_through_a_sign_extended_load() {
    let asm = compile("int main() { char c; c = 65; return c; }");
    assert!(asm.contains("  mov [rax], dil\n"));
    assert!(asm.contains("  movsx rax, byte ptr [rax]\n"));
}

#[test]
fn undefined_identifier_fails_compilation_with_a_located_message() {
    let err = subc::compile("int main() { return nope; }").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("undefined identifier"));
    assert!(msg.contains("nope"));
}

#[test]
fn dereferencing_a_non_pointer_fails_compilation() {
    let err = subc::compile("int main() { int a; return *a; }").unwrap_err();
    assert!(err.to_string().contains("pointer"));
}

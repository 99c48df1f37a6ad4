//! End-to-end integration tests for the lex -> parse -> transform ->
//! typecheck -> codegen -> clang -> run pipeline.
//!
//! Each test compiles a literal source string, runs the resulting binary,
//! and checks its captured stdout. Tests that need `clang` to actually link
//! and run a binary skip themselves (rather than failing) when it isn't on
//! `PATH`, since the assembler is an external collaborator this crate does
//! not ship.

use si_codegen::{clang_available, compile_and_run, compile_to_ir, CompileOptions};
use si_parse::{check_module, lex, transform_module, Parser};

fn compile_source(src: &str) -> Result<si_parse::TypedModule, String> {
    let (file, toks) = lex("t.si", src).map_err(|e| e.to_string())?;
    let module = Parser::new(&toks).parse_module().map_err(|e| e.to_string())?;
    let _ = &file;
    let tm = transform_module(&module).map_err(|e| e.to_string())?;
    check_module(&tm).map_err(|e| e.to_string())?;
    Ok(tm)
}

fn run(src: &str) -> String {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return String::new();
    }
    let tm = compile_source(src).expect("pipeline should succeed");
    let options = CompileOptions::default();
    let result = compile_and_run(&tm, &options).expect("compile_and_run should succeed");
    result.stdout
}

#[test]
fn hello_literal() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        i64 main() {
            printf("10");
            return 0;
        }
    "#;
    assert_eq!(run(src), "10");
}

#[test]
fn recursive_fibonacci() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        i64 fib(i64 n) {
            if (n < 2) return n;
            return fib(n - 1) + fib(n - 2);
        }
        i64 main() {
            printf("fib(%d) = %d\n", 5, fib(5));
            return 0;
        }
    "#;
    assert_eq!(run(src), "fib(5) = 5\n");
}

#[test]
fn bubble_sort_six_elements() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        void print_array(i64 arr[6]) {
            i64 i = 0;
            while (i < 6) {
                printf("%d ", arr[i]);
                i = i + 1;
            }
            printf("\n");
        }
        i64 main() {
            i64 arr[6];
            arr[0] = 64; arr[1] = 32; arr[2] = 100;
            arr[3] = 0; arr[4] = -1; arr[5] = -1;
            printf("Unsorted array: \n");
            print_array(arr);
            i64 i = 0;
            while (i < 6) {
                i64 j = 0;
                while (j < 5 - i) {
                    if (arr[j] > arr[j + 1]) {
                        i64 tmp = arr[j];
                        arr[j] = arr[j + 1];
                        arr[j + 1] = tmp;
                    }
                    j = j + 1;
                }
                i = i + 1;
            }
            printf("Sorted array: \n");
            print_array(arr);
            return 0;
        }
    "#;
    assert_eq!(
        run(src),
        "Unsorted array: \n64 32 100 0 -1 -1 \nSorted array: \n-1 -1 0 32 64 100 \n"
    );
}

#[test]
fn reverse_linked_list_of_four_nodes() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        i8 *malloc(i64 size);

        type struct { i64 data, Node *next, } Node;

        void print_list(Node *head) {
            Node *cur = head;
            while (cur != NULL) {
                printf("%d ", cur->data);
                cur = cur->next;
            }
            printf("\n");
        }

        Node *reverse(Node *head) {
            Node *prev = (Node *) NULL;
            Node *cur = head;
            while (cur != NULL) {
                Node *next = cur->next;
                cur->next = prev;
                prev = cur;
                cur = next;
            }
            return prev;
        }

        i64 main() {
            Node *head = (Node *) malloc(sizeof(Node));
            head->data = 1;
            head->next = (Node *) malloc(sizeof(Node));
            head->next->data = 2;
            head->next->next = (Node *) malloc(sizeof(Node));
            head->next->next->data = 3;
            head->next->next->next = (Node *) malloc(sizeof(Node));
            head->next->next->next->data = 4;
            head->next->next->next->next = (Node *) NULL;

            printf("Original list: ");
            print_list(head);
            Node *reversed = reverse(head);
            printf("Reversed list: ");
            print_list(reversed);
            return 0;
        }
    "#;
    assert_eq!(run(src), "Original list: 1 2 3 4 \nReversed list: 4 3 2 1 \n");
}

#[test]
fn inplace_string_reversal() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        i64 strlen(i8 *s);

        void reverse(i8 *s, i64 len) {
            i64 lo = 0;
            i64 hi = len - 1;
            while (lo < hi) {
                i8 tmp = s[lo];
                s[lo] = s[hi];
                s[hi] = tmp;
                lo = lo + 1;
                hi = hi - 1;
            }
        }

        i64 main() {
            i8 buf[6];
            buf[0] = 'h'; buf[1] = 'e'; buf[2] = 'l';
            buf[3] = 'l'; buf[4] = 'o'; buf[5] = 0;
            reverse(buf, 5);
            printf("%s", buf);
            return 0;
        }
    "#;
    assert_eq!(run(src), "olleh");
}

#[test]
fn binary_search_finds_index() {
    if !clang_available("clang") {
        eprintln!("skipping: clang not on PATH");
        return;
    }
    let src = r#"
        i64 printf(i8 *fmt, ...);
        i64 search(i64 arr[10], i64 target) {
            i64 lo = 0;
            i64 hi = 9;
            while (lo <= hi) {
                i64 mid = (lo + hi) / 2;
                if (arr[mid] == target) return mid;
                if (arr[mid] < target) lo = mid + 1;
                else hi = mid - 1;
            }
            return -1;
        }
        i64 main() {
            i64 arr[10];
            i64 i = 0;
            while (i < 10) {
                arr[i] = i + 1;
                i = i + 1;
            }
            printf("%d", search(arr, 5));
            return 0;
        }
    "#;
    assert_eq!(run(src), "4");
}

#[test]
fn emit_ir_produces_a_define_for_main_without_invoking_clang() {
    let src = "i64 main() { return 0; }";
    let tm = compile_source(src).expect("pipeline should succeed");
    let ir = compile_to_ir(&tm).expect("lowering to IR should succeed");
    assert!(ir.contains("define i64 @main()"));
}

#[test]
fn incompatible_type_comparison_is_a_type_error() {
    let src = r#"
        type i64 hello;
        i64 main() {
            hello a = (hello) 10;
            bool d = a == 10;
            return 0;
        }
    "#;
    let err = compile_source(src).expect_err("comparing hello against i64 should fail typecheck");
    assert!(
        err.contains("hello") && err.contains("i64"),
        "expected an incompatible-types message, got: {err}"
    );
}

#[test]
fn break_outside_loop_is_rejected_before_codegen() {
    // Typechecking rejects this before codegen ever runs, so codegen's own
    // loop-stack guard (CodegenError::IRInvariant) is unreachable from this
    // pipeline in practice -- it stays as a defensive invariant for anyone
    // building a TypedModule by hand instead of through transform_module.
    let src = r#"
        i64 main() {
            break;
            return 0;
        }
    "#;
    let err = compile_source(src).expect_err("break outside a loop should fail typecheck");
    assert!(err.contains("break"), "expected a break-outside-loop message, got: {err}");
}

//! Property tests for the rule compiler: compilation determinism and the
//! head-variable boundness invariant.

use inferox::{CompileError, RuleCompiler};
use proptest::prelude::*;

/// Extract every `?var` token from a block of SPARQL text.
fn variables(text: &str) -> Vec<String> {
    let mut vars = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '?' {
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !name.is_empty() {
            vars.push(name);
        }
    }
    vars
}

proptest! {
    #[test]
    fn prop_recompilation_is_deterministic(
        name in "[a-z][a-zA-Z0-9]{0,8}",
        class in "[A-Z][a-z]{1,6}",
        var in "[a-z]{1,4}",
    ) {
        let source = format!("[{name}: (?{var} rdf:type :{class}) -> (?{var} rdf:type :Derived)]");
        let compiler = RuleCompiler::new();
        let first = compiler.compile(&source).expect("compiles");
        let second = compiler.compile(&source).expect("compiles");
        prop_assert_eq!(&first[0].sparql, &second[0].sparql);
    }

    #[test]
    fn prop_construct_variables_are_bound_in_where(
        pred in "[a-z]{1,6}",
        var in "[a-z]{1,4}",
        out in "[a-z]{1,4}",
    ) {
        let source = format!(
            "[r: (?{var} :{pred} ?v) sum(?v, 1, ?{out}) -> (?{var} :derived ?{out})]"
        );
        let compiled = RuleCompiler::new().compile(&source).expect("compiles");
        let sparql = &compiled[0].sparql;

        let construct = sparql
            .split_once("CONSTRUCT {").expect("construct").1
            .split_once('}').expect("construct end").0;
        let where_clause = sparql.split_once("WHERE {").expect("where").1;

        let where_vars = variables(where_clause);
        for var in variables(construct) {
            prop_assert!(
                where_vars.contains(&var),
                "head variable ?{} missing from WHERE clause", var
            );
        }
    }

    #[test]
    fn prop_unbound_head_variable_is_rejected(
        bound in "[a-b]{1,3}",
        unbound in "[x-z]{1,3}",
    ) {
        let source = format!("[r: (?{bound} :p 1) -> (?{bound} :q ?{unbound})]");
        let err = RuleCompiler::new().compile(&source).expect_err("unbound var");
        prop_assert!(matches!(err, CompileError::UnboundHeadVariable { .. }));
    }

    #[test]
    fn prop_garbage_outside_brackets_never_panics(input in "[^\\[\\]]{0,40}") {
        // Arbitrary bracket-free text either compiles to nothing or fails
        // cleanly; it must never panic.
        let _ = RuleCompiler::new().compile(&input);
    }
}

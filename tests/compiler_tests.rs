//! Rule compilation tests: grammar, comments, built-in translation, and the
//! emitted WHERE-clause ordering contract.

use inferox::{CompileError, CompiledRule, RuleCompiler};

fn compile_one(text: &str) -> CompiledRule {
    let mut rules = RuleCompiler::new().compile(text).expect("rule compiles");
    assert_eq!(rules.len(), 1, "expected exactly one rule");
    rules.remove(0)
}

// Structure

#[test]
fn test_simple_rule_emits_construct_query() {
    let rule = compile_one("[r1: (?x rdf:type :B) -> (?x rdf:type :C)]");

    assert_eq!(rule.name, "r1");
    assert!(rule.sparql.starts_with("# Rule: r1\n"));
    assert!(rule.sparql.contains("PREFIX : <https://example.org/ns#>"));
    assert!(rule.sparql.contains("PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>"));
    assert!(rule.sparql.contains("CONSTRUCT {\n    ?x rdf:type :C .\n}"));
    assert!(rule.sparql.contains("WHERE {\n    ?x rdf:type :B .\n}"));
}

#[test]
fn test_recompilation_is_character_identical() {
    let source = "[r1: (?x :p ?v) greaterThan(?v, 3) -> (?x :big \"yes\")]";
    let compiler = RuleCompiler::new();
    let first = compiler.compile(source).expect("compiles");
    let second = compiler.compile(source).expect("compiles");
    assert_eq!(first[0].sparql, second[0].sparql);
}

#[test]
fn test_where_clause_ordering_contract() {
    // patterns, then BINDs, then FILTERs, then NOT-EXISTS
    let rule = compile_one(
        "[r: (?x :p ?v) greaterThan(?v, 0) sum(?v, 1, ?w) noValue(?x, :q, ?v) -> (?x :r ?w)]",
    );
    let where_clause = rule
        .sparql
        .split_once("WHERE {")
        .expect("has WHERE")
        .1;

    let pattern = where_clause.find("?x :p ?v .").expect("pattern present");
    let bind = where_clause.find("BIND((?v + 1) AS ?w)").expect("bind present");
    let filter = where_clause.find("FILTER(?v > 0)").expect("filter present");
    let not_exists = where_clause
        .find("FILTER(NOT EXISTS { ?x :q ?v })")
        .expect("negation present");

    assert!(pattern < bind);
    assert!(bind < filter);
    assert!(filter < not_exists);
}

#[test]
fn test_multiple_rules_compile_in_order() {
    let rules = RuleCompiler::new()
        .compile("[a: (?x :p ?y) -> (?x :q ?y)]  [b: (?x :q ?y) -> (?x :r ?y)]")
        .expect("compiles");
    let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_multiline_rule() {
    let rule = compile_one(
        "[chain:\n  (?x :parent ?y)\n  (?y :parent ?z)\n  ->\n  (?x :grandparent ?z)\n]",
    );
    assert!(rule.sparql.contains("?x :parent ?y ."));
    assert!(rule.sparql.contains("?y :parent ?z ."));
    assert!(rule.sparql.contains("?x :grandparent ?z ."));
}

#[test]
fn test_caller_supplied_prefix_is_emitted() {
    let mut compiler = RuleCompiler::new();
    compiler.add_prefix("app", "https://example.org/app#");
    let rules = compiler
        .compile("[r: (?x app:kind ?k) -> (?x :kind ?k)]")
        .expect("compiles");
    assert!(rules[0].sparql.contains("PREFIX app: <https://example.org/app#>"));
}

// Value normalization

#[test]
fn test_boolean_literals_become_typed_literals() {
    let rule = compile_one("[r: (?x :active <true>) -> (?x :flagged true)]");
    assert!(rule.sparql.contains("?x :flagged \"true\"^^xsd:boolean ."));
    assert!(rule.sparql.contains("?x :active \"true\"^^xsd:boolean ."));

    let rule = compile_one("[r: (?x :p ?v) -> (?x :ok false)]");
    assert!(rule.sparql.contains("\"false\"^^xsd:boolean"));
}

// Comments

#[test]
fn test_line_and_block_comments_are_stripped() {
    let source = "
        # a leading comment
        [r1: (?x :p ?y) /* inline
        block comment */ -> (?x :q ?y)] # trailing
    ";
    let rule = compile_one(source);
    assert!(rule.sparql.contains("?x :q ?y ."));
}

#[test]
fn test_hash_inside_quoted_literal_is_preserved() {
    let rule = compile_one("[r: (?x :label \"#important\") -> (?x :tagged \"#important\")]");
    assert!(rule.sparql.contains("\"#important\""));
}

#[test]
fn test_hash_inside_absolute_iri_is_preserved() {
    let rule =
        compile_one("[r: (?x ?p <https://example.org/ns#Thing>) -> (?x :isThing \"y\")]");
    assert!(rule.sparql.contains("<https://example.org/ns#Thing>"));
}

// Boundary behaviors

#[test]
fn test_empty_body_is_rejected() {
    let err = RuleCompiler::new()
        .compile("[r: -> (?x :p ?y)]")
        .expect_err("empty body");
    assert!(err.to_string().contains("empty body"));
}

#[test]
fn test_empty_head_is_rejected() {
    let err = RuleCompiler::new()
        .compile("[r: (?x :p ?y) -> ]")
        .expect_err("empty head");
    assert!(err.to_string().contains("empty head"));
}

#[test]
fn test_nested_brackets_are_rejected() {
    let err = RuleCompiler::new()
        .compile("[r: (?x :p ?y) [inner] -> (?x :q ?y)]")
        .expect_err("nested");
    assert!(err.to_string().contains("nested brackets"));
}

#[test]
fn test_missing_arrow_is_rejected() {
    let err = RuleCompiler::new()
        .compile("[r: (?x :p ?y) (?x :q ?y)]")
        .expect_err("no arrow");
    assert!(err.to_string().contains("->"));
}

#[test]
fn test_unbound_head_variable_is_rejected() {
    let err = RuleCompiler::new()
        .compile("[r: (?x :p ?y) -> (?x :q ?z)]")
        .expect_err("unbound");
    match err {
        CompileError::UnboundHeadVariable { rule, variable } => {
            assert_eq!(rule, "r");
            assert_eq!(variable, "?z");
        }
        other => panic!("expected UnboundHeadVariable, got {other}"),
    }
}

#[test]
fn test_binder_output_counts_as_bound() {
    // ?id comes from makeSkolem, not from any triple pattern
    let rule = compile_one("[r3: (?p :hasName ?n) makeSkolem(?id, ?p, ?n) -> (?p :identifiedAs ?id)]");
    assert!(rule.sparql.contains(
        "BIND(IRI(CONCAT(\"urn:skolem:\", ENCODE_FOR_URI(STR(?p)), \"_\", ENCODE_FOR_URI(STR(?n)))) AS ?id)"
    ));
}

// Built-ins

#[test]
fn test_unknown_builtin_is_an_error_by_default() {
    let err = RuleCompiler::new()
        .compile("[r: (?x :p ?v) frobnicate(?v) -> (?x :q ?v)]")
        .expect_err("unknown builtin");
    match err {
        CompileError::UnknownBuiltin { builtin, .. } => assert_eq!(builtin, "frobnicate"),
        other => panic!("expected UnknownBuiltin, got {other}"),
    }
}

#[test]
fn test_lenient_mode_drops_unknown_builtins() {
    let rules = RuleCompiler::new()
        .lenient(true)
        .compile("[r: (?x :p ?v) frobnicate(?v) -> (?x :q ?v)]")
        .expect("lenient compiles");
    assert!(!rules[0].sparql.contains("frobnicate"));
    assert!(rules[0].sparql.contains("?x :q ?v ."));
}

#[test]
fn test_novalue_comma_and_space_forms_agree() {
    let comma = compile_one("[r: (?x :p ?v) noValue(?x, :marked, \"yes\") -> (?x :marked \"yes\")]");
    let space = compile_one("[r: (?x :p ?v) noValue(?x :marked \"yes\") -> (?x :marked \"yes\")]");
    let expected = "FILTER(NOT EXISTS { ?x :marked \"yes\" })";
    assert!(comma.sparql.contains(expected));
    assert!(space.sparql.contains(expected));
    assert_eq!(comma.sparql, space.sparql);
}

#[test]
fn test_comparison_builtins() {
    let rule = compile_one("[r: (?x :age ?a) ge(?a, 18) notEqual(?a, 99) -> (?x :adult true)]");
    assert!(rule.sparql.contains("FILTER(?a >= 18)"));
    assert!(rule.sparql.contains("FILTER(?a != 99)"));
}

#[test]
fn test_string_builtins() {
    let rule = compile_one(
        "[r: (?x :first ?f) (?x :last ?l) strConcat(?f, \" \", ?l, ?full) -> (?x :name ?full)]",
    );
    assert!(rule.sparql.contains("BIND(CONCAT(?f, \" \", ?l) AS ?full)"));

    let rule = compile_one(
        "[r: (?x :id ?i) uriConcat(\"https://example.org/id/\", ?i, ?iri) -> (?x :iri ?iri)]",
    );
    assert!(rule
        .sparql
        .contains("BIND(IRI(CONCAT(\"https://example.org/id/\", ?i)) AS ?iri)"));
}

#[test]
fn test_regex_and_type_predicates() {
    let rule = compile_one(
        "[r: (?x :code ?c) regex(?c, \"^[A-Z]+$\") isLiteral(?c) notBNode(?x) -> (?x :valid true)]",
    );
    assert!(rule.sparql.contains("FILTER(REGEX(?c, \"^[A-Z]+$\"))"));
    assert!(rule.sparql.contains("FILTER(isLiteral(?c))"));
    assert!(rule.sparql.contains("FILTER(!isBlank(?x))"));
}

#[test]
fn test_arithmetic_and_temporal_builtins() {
    let rule = compile_one(
        "[r: (?x :n ?v) product(?v, 2, ?d) now(?t) -> (?x :double ?d) (?x :seenAt ?t)]",
    );
    assert!(rule.sparql.contains("BIND((?v * 2) AS ?d)"));
    assert!(rule.sparql.contains("BIND(NOW() AS ?t)"));
}

#[test]
fn test_list_contains_property_path() {
    let rule = compile_one("[r: (?x :options ?l) (?x :choice ?c) listContains(?l, ?c) -> (?x :validChoice ?c)]");
    assert!(rule
        .sparql
        .contains("FILTER(EXISTS { ?l rdf:rest*/rdf:first ?c })"));
}

#[test]
fn test_make_temp_binds_blank_node() {
    let rule = compile_one("[r: (?x :p ?v) makeTemp(?t) -> (?x :tmp ?t)]");
    assert!(rule.sparql.contains("BIND(BNODE() AS ?t)"));
}

#[test]
fn test_known_builtin_predicate() {
    assert!(inferox::is_known_builtin("makeSkolem"));
    assert!(inferox::is_known_builtin("noValue"));
    assert!(!inferox::is_known_builtin("frobnicate"));
}

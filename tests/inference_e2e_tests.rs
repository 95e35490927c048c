//! End-to-end inference scenarios: type propagation, negation-as-failure,
//! skolem identity across runs, framework ordering, oscillation clamping,
//! cache hits, and run determinism.

use inferox::{Config, GraphStore, InferenceSystem, QueryOutcome, ResultCache};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREFIX: &str = "@prefix : <https://example.org/ns#> .\n";
const NS: &str = "https://example.org/ns#";

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

/// A custom-tier framework with one rules file.
fn write_rules_framework(dir: &Path, name: &str, rules: &str) {
    write_file(
        &dir.join("framework.toml"),
        &format!("name = \"{name}\"\n\n[files]\nrules = [\"core.rules\"]\n"),
    );
    write_file(&dir.join("core.rules"), rules);
}

fn data_file(tmp: &TempDir, turtle: &str) -> PathBuf {
    let path = tmp.path().join("data.ttl");
    write_file(&path, turtle);
    path
}

fn system(tmp: &TempDir) -> InferenceSystem {
    InferenceSystem::new(&Config::default(), tmp.path().to_path_buf()).expect("system")
}

fn ask(sys: &InferenceSystem, pattern: &str) -> bool {
    match sys
        .store()
        .query(&format!("ASK {{ {pattern} }}"))
        .expect("ask")
    {
        QueryOutcome::Boolean(b) => b,
        other => panic!("expected boolean, got {other:?}"),
    }
}

fn sorted_dump(store: &GraphStore) -> Vec<String> {
    let dump = store.dump_nquads().expect("dump");
    let text = String::from_utf8(dump).expect("utf8");
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    lines.sort();
    lines
}

#[test]
fn test_type_propagation() {
    let tmp = TempDir::new().expect("tempdir");
    write_rules_framework(
        &tmp.path().join("fw"),
        "types",
        "[r1: (?x rdf:type :B) -> (?x rdf:type :C)]",
    );

    let mut sys = system(&tmp);
    sys.load_framework(&tmp.path().join("fw")).expect("framework");
    sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:a a :B .")));

    let summary = sys.run().expect("run");

    assert!(summary.converged);
    assert_eq!(summary.final_triples - summary.initial_triples, 1);
    assert!(ask(
        &sys,
        &format!("<{NS}a> a <{NS}C>")
    ));

    // Fixed-point law: one extra round after convergence adds nothing
    assert_eq!(sys.run_round().expect("extra round"), 0);
}

#[test]
fn test_negation_as_failure() {
    let tmp = TempDir::new().expect("tempdir");
    write_rules_framework(
        &tmp.path().join("fw"),
        "marker",
        "[r2: (?x :p ?v) noValue(?x, :marked, \"yes\") -> (?x :marked \"yes\")]",
    );

    let mut sys = system(&tmp);
    sys.load_framework(&tmp.path().join("fw")).expect("framework");
    sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:a :p 1 . :b :q 2 .")));

    let summary = sys.run().expect("run");

    assert!(summary.converged);
    assert!(ask(&sys, &format!("<{NS}a> <{NS}marked> \"yes\"")));
    assert!(!ask(&sys, &format!("<{NS}b> <{NS}marked> ?v")));
    assert_eq!(sys.run_round().expect("extra round"), 0);
}

#[test]
fn test_skolem_identity_is_stable_across_runs() {
    let rules = "[r3: (?p :hasName ?n) makeSkolem(?id, ?p, ?n) -> (?p :identifiedAs ?id)]";

    let run_once = || {
        let tmp = TempDir::new().expect("tempdir");
        write_rules_framework(&tmp.path().join("fw"), "ids", rules);
        let mut sys = system(&tmp);
        sys.load_framework(&tmp.path().join("fw")).expect("framework");
        sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:alice :hasName \"Alice\" .")));
        let summary = sys.run().expect("run");
        assert!(summary.converged);

        let rows = sys
            .query(&format!("SELECT ?id WHERE {{ <{NS}alice> <{NS}identifiedAs> ?id }}"))
            .expect("select");
        assert_eq!(rows.len(), 1);
        inferox::term_value(&rows[0][0].1)
    };

    let first = run_once();
    let second = run_once();

    assert!(first.starts_with("urn:skolem:"));
    assert!(first.ends_with("_Alice"));
    assert_eq!(first, second, "skolem IRI must be byte-identical across runs");
}

#[test]
fn test_framework_ordering_tier_before_load_order() {
    // A (Core, via the system metamodel) feeds B (Custom): one productive
    // round plus the convergence round.
    let tmp = TempDir::new().expect("tempdir");
    let metamodel = tmp.path().join("metamodel");
    write_rules_framework(&metamodel.join("a"), "a", "[xy: (?n rdf:type :X) -> (?n rdf:type :Y)]");
    write_rules_framework(&tmp.path().join("b"), "b", "[yz: (?n rdf:type :Y) -> (?n rdf:type :Z)]");

    let mut sys = system(&tmp);
    sys.load_system_frameworks(&metamodel).expect("system frameworks");
    sys.load_framework(&tmp.path().join("b")).expect("b");
    sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:n a :X .")));

    let summary = sys.run().expect("run");
    assert!(summary.converged);
    assert_eq!(summary.rounds, 2);
    for class in ["X", "Y", "Z"] {
        assert!(ask(&sys, &format!("<{NS}n> a <{NS}{class}>")));
    }
}

#[test]
fn test_framework_ordering_unfavorable_load_order_still_converges() {
    // Both Custom, consumer loaded before producer: an extra round is
    // needed, but the same facts are derived.
    let tmp = TempDir::new().expect("tempdir");
    write_rules_framework(&tmp.path().join("a"), "a", "[xy: (?n rdf:type :X) -> (?n rdf:type :Y)]");
    write_rules_framework(&tmp.path().join("b"), "b", "[yz: (?n rdf:type :Y) -> (?n rdf:type :Z)]");

    let mut sys = system(&tmp);
    sys.load_framework(&tmp.path().join("b")).expect("b");
    sys.load_framework(&tmp.path().join("a")).expect("a");
    sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:n a :X .")));

    let summary = sys.run().expect("run");
    assert!(summary.converged);
    assert_eq!(summary.rounds, 3);
    for class in ["X", "Y", "Z"] {
        assert!(ask(&sys, &format!("<{NS}n> a <{NS}{class}>")));
    }
}

#[test]
fn test_update_driven_oscillation_is_clamped_at_max_rounds() {
    let tmp = TempDir::new().expect("tempdir");
    let mut sys = system(&tmp);
    sys.add_data_file(data_file(&tmp, &format!("{PREFIX}:x :n 0 .")));

    sys.add_construct(
        format!(
            "PREFIX : <{NS}>\nCONSTRUCT {{ ?x :flagged true }} WHERE {{ ?x :n ?v . FILTER(?v >= 0) }}"
        ),
        Some("flagger".to_string()),
    );
    sys.add_update(
        format!("PREFIX : <{NS}>\nDELETE WHERE {{ ?x :flagged true }}"),
        Some("unflagger".to_string()),
    );

    let summary = sys.run().expect("run completes without error");

    assert!(!summary.converged);
    assert_eq!(summary.rounds, 10);
}

#[test]
fn test_cache_hit_skips_rule_execution() {
    let tmp = TempDir::new().expect("tempdir");
    write_rules_framework(
        &tmp.path().join("fw"),
        "types",
        "[r1: (?x rdf:type :B) -> (?x rdf:type :C)]",
    );
    let data = data_file(&tmp, &format!("{PREFIX}:a a :B ."));
    let cache = ResultCache::new(&tmp.path().join("cache")).expect("cache");

    // First run: miss, compute, save
    let mut first = system(&tmp);
    first.load_framework(&tmp.path().join("fw")).expect("framework");
    first.add_data_file(data.clone());
    let key = first.cache_key().expect("key");
    assert!(!cache.exists(&key));

    let summary = first.run().expect("run");
    cache.save(first.store(), &key).expect("save");
    let expected_triples = summary.final_triples;

    // Second run with identical inputs: hit, no rule execution
    let mut second = system(&tmp);
    second.load_framework(&tmp.path().join("fw")).expect("framework");
    second.add_data_file(data);
    let second_key = second.cache_key().expect("key");
    assert_eq!(key, second_key);
    assert!(cache.exists(&second_key));

    let store = cache.load(&second_key).expect("cache load");
    second.adopt_store(store).expect("adopt");

    assert_eq!(second.store().count().expect("count"), expected_triples);
    assert!(second.stats().is_empty(), "no rule execution observed");
    assert!(ask(&second, &format!("<{NS}a> a <{NS}C>")));
}

#[test]
fn test_monotone_growth_without_updates() {
    let tmp = TempDir::new().expect("tempdir");
    write_rules_framework(
        &tmp.path().join("fw"),
        "closure",
        "[base: (?x :next ?y) -> (?x :reach ?y)]
         [step: (?x :reach ?y) (?y :reach ?z) -> (?x :reach ?z)]",
    );

    let mut sys = system(&tmp);
    sys.load_framework(&tmp.path().join("fw")).expect("framework");
    sys.add_data_file(data_file(
        &tmp,
        &format!("{PREFIX}:n1 :next :n2 . :n2 :next :n3 . :n3 :next :n4 ."),
    ));

    let summary = sys.run().expect("run");
    assert!(summary.converged);
    assert!(summary.final_triples >= summary.initial_triples);
    // 4-node chain: 3+2+1 reachable pairs on top of the 3 base triples
    assert_eq!(summary.final_triples - summary.initial_triples, 6);
}

#[test]
fn test_two_runs_produce_bit_identical_dumps() {
    let rules = "
        [r1: (?x rdf:type :B) -> (?x rdf:type :C)]
        [r3: (?p :hasName ?n) makeSkolem(?id, ?p, ?n) -> (?p :identifiedAs ?id)]
    ";
    let turtle = format!(
        "{PREFIX}:a a :B ; :hasName \"Ada\" . :b :knows [ :hasName \"Eve\" ] ."
    );

    let run_once = || {
        let tmp = TempDir::new().expect("tempdir");
        write_rules_framework(&tmp.path().join("fw"), "mixed", rules);
        let mut sys = system(&tmp);
        sys.load_framework(&tmp.path().join("fw")).expect("framework");
        sys.add_data_file(data_file(&tmp, &turtle));
        sys.run().expect("run");
        sorted_dump(sys.store())
    };

    assert_eq!(run_once(), run_once());
}

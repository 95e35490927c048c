//! # Inferox CLI
//!
//! Run rule-based inference over RDF data and query the derived graph.
//!
//! ## Usage
//!
//! ```bash
//! # Run inference with two frameworks and a data file
//! inferox run --framework frameworks/base --framework frameworks/hipaa \
//!     --data records.ttl --query report.rq
//!
//! # Compile a rules file to SPARQL and inspect the output
//! inferox compile rules/core.rules
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use inferox::{
    term_kind, term_value, Config, InferenceSystem, ResultCache, RuleCompiler, SolutionRow,
};

#[derive(Parser)]
#[command(name = "inferox", version, about = "Forward-chaining inference for RDF knowledge graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run inference to convergence over frameworks and data files
    Run(RunArgs),
    /// Compile a rules file to SPARQL CONSTRUCT queries
    Compile(CompileArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Framework directory to load (repeatable)
    #[arg(long = "framework", value_name = "DIR")]
    frameworks: Vec<PathBuf>,

    /// System metamodel directory with internal/core frameworks
    #[arg(long, value_name = "DIR")]
    metamodel: Option<PathBuf>,

    /// Data file to process (repeatable)
    #[arg(long = "data", value_name = "FILE", required = true)]
    data: Vec<PathBuf>,

    /// SPARQL CONSTRUCT query file to apply during inference (repeatable)
    #[arg(long = "construct", value_name = "FILE")]
    constructs: Vec<PathBuf>,

    /// SPARQL UPDATE query file to apply during inference (repeatable)
    #[arg(long = "upsert", value_name = "FILE")]
    upserts: Vec<PathBuf>,

    /// SPARQL SELECT query file to run after inference (repeatable)
    #[arg(long = "query", value_name = "FILE")]
    queries: Vec<PathBuf>,

    /// Export the inferred graph to a file (N-Quads)
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Maximum inference rounds
    #[arg(long, value_name = "N")]
    max_rounds: Option<usize>,

    /// Verbose output (-v progress, -vv detail, -vvv everything)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Show the new triples added in each iteration
    #[arg(long)]
    debug_diff: bool,

    /// Drop unrecognized rule built-ins instead of failing
    #[arg(long)]
    lenient: bool,

    /// Cache inference results keyed by input content
    #[arg(long)]
    cache: bool,

    /// Directory for cached inference results
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Remove any cached result for these inputs before running
    #[arg(long)]
    rm_cache: bool,

    /// How to render query results
    #[arg(long, value_enum, default_value = "json")]
    display_mode: DisplayMode,

    /// Sort rendered query results
    #[arg(long)]
    sort: bool,
}

#[derive(Args)]
struct CompileArgs {
    /// Rules file to compile
    rules_file: PathBuf,

    /// Write compiled SPARQL to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print a header line before each compiled rule
    #[arg(long)]
    separate: bool,

    /// Drop unrecognized built-ins instead of failing
    #[arg(long)]
    lenient: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DisplayMode {
    Json,
    Tuples,
    Table,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args),
        Command::Compile(args) => compile(args),
    }
}

fn init_tracing(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => config.logging.level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("inferox={level}")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(max_rounds) = args.max_rounds {
        config.engine.max_rounds = max_rounds;
    }
    config.engine.debug_diff |= args.debug_diff;
    config.engine.lenient_builtins |= args.lenient;
    config.cache.enabled |= args.cache;
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }
    init_tracing(args.verbose, &config);

    let working_dir = std::env::current_dir().context("cannot determine working directory")?;
    let mut system = InferenceSystem::new(&config, working_dir)?;

    if let Some(metamodel) = &args.metamodel {
        system.load_system_frameworks(metamodel)?;
    }
    for dir in &args.frameworks {
        system.load_framework(dir)?;
    }
    for path in args.data {
        system.add_data_file(path);
    }
    for path in &args.constructs {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read construct file {}", path.display()))?;
        system.add_construct(text, Some(path.display().to_string()));
    }
    for path in &args.upserts {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read upsert file {}", path.display()))?;
        system.add_update(text, Some(path.display().to_string()));
    }

    if config.cache.enabled {
        run_with_cache(&mut system, &config, args.rm_cache)?;
    } else {
        let summary = system.run()?;
        print_summary(&summary);
    }

    for (i, path) in args.queries.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("=== Query: {} ===", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read query file {}", path.display()))?;
        let rows = system.query(&text)?;
        render_rows(&rows, args.display_mode, args.sort);
    }

    if let Some(path) = &args.export {
        system.export(path)?;
        println!("Exported to: {}", path.display());
    }

    Ok(())
}

fn run_with_cache(system: &mut InferenceSystem, config: &Config, rm_cache: bool) -> Result<()> {
    let cache = ResultCache::new(&config.cache.dir)?;
    let key = system.cache_key()?;

    if rm_cache {
        cache.remove(&key)?;
    }

    if cache.exists(&key) {
        println!("Loading from cache: {}", cache.entry_path(&key).display());
        let store = cache.load(&key)?;
        system.adopt_store(store)?;
        println!("Inference completed (loaded from cache)");
    } else {
        println!("Cache miss. Running inference...");
        let summary = system.run()?;
        print_summary(&summary);
        let saved = cache.save(system.store(), &key)?;
        println!("  Saved to cache: {}", saved.display());
    }
    Ok(())
}

fn print_summary(summary: &inferox::RunSummary) {
    println!("Inference completed:");
    println!("  Rounds: {}", summary.rounds);
    println!("  Converged: {}", summary.converged);
    println!("  Triples: {} -> {}", summary.initial_triples, summary.final_triples);
}

fn compile(args: CompileArgs) -> Result<()> {
    let content = fs::read_to_string(&args.rules_file)
        .with_context(|| format!("cannot read rules file {}", args.rules_file.display()))?;

    let compiler = RuleCompiler::new().lenient(args.lenient);
    let compiled = compiler.compile(&content)?;

    let mut sections = Vec::with_capacity(compiled.len());
    for (i, rule) in compiled.iter().enumerate() {
        if args.separate {
            sections.push(format!("# === Rule {} ===\n{}", i + 1, rule.sparql));
        } else {
            sections.push(rule.sparql.clone());
        }
    }
    let output = sections.join("\n\n");

    match &args.output {
        Some(path) => {
            fs::write(path, format!("{output}\n"))
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("Compiled SPARQL written to: {}", path.display());
        }
        None => println!("{output}"),
    }
    Ok(())
}

/// Short fragment of an IRI: the part after the last `#` or `/`.
fn fragment(iri: &str) -> &str {
    let iri = iri.strip_prefix("_:").unwrap_or(iri);
    if let Some((_, frag)) = iri.rsplit_once('#') {
        return frag;
    }
    if let Some((_, frag)) = iri.rsplit_once('/') {
        return frag;
    }
    iri
}

fn render_rows(rows: &[SolutionRow], mode: DisplayMode, sort: bool) {
    println!("\nQuery results:");
    if rows.is_empty() {
        println!("No results");
        return;
    }

    match mode {
        DisplayMode::Json => {
            let bindings: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let mut object = serde_json::Map::new();
                    for (var, term) in row {
                        object.insert(
                            var.clone(),
                            serde_json::json!({
                                "type": term_kind(term),
                                "value": term_value(term),
                            }),
                        );
                    }
                    serde_json::Value::Object(object)
                })
                .collect();
            let document = serde_json::json!({ "results": { "bindings": bindings } });
            println!("{document}");
        }
        DisplayMode::Tuples => {
            let mut lines: Vec<String> = rows
                .iter()
                .map(|row| {
                    let values: Vec<String> = row
                        .iter()
                        .map(|(_, term)| display_value(term))
                        .collect();
                    format!("({})", values.join(", "))
                })
                .collect();
            if sort {
                lines.sort();
            }
            for line in lines {
                println!("{line}");
            }
        }
        DisplayMode::Table => {
            let headers: Vec<&str> = rows[0].iter().map(|(var, _)| var.as_str()).collect();
            let mut body: Vec<Vec<String>> = rows
                .iter()
                .map(|row| row.iter().map(|(_, term)| display_value(term)).collect())
                .collect();
            if sort {
                body.sort();
            }

            let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
            for row in &body {
                for (i, cell) in row.iter().enumerate() {
                    if i < widths.len() {
                        widths[i] = widths[i].max(cell.len());
                    }
                }
            }

            let header_line: Vec<String> = headers
                .iter()
                .zip(&widths)
                .map(|(h, w)| format!("{h:<w$}"))
                .collect();
            println!("{}", header_line.join("  "));
            println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
            for row in &body {
                let cells: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| format!("{c:<w$}"))
                    .collect();
                println!("{}", cells.join("  "));
            }
        }
    }
}

/// Compact rendering of one bound term: IRIs shrink to `:fragment`,
/// literals print their value.
fn display_value(term: &inferox::Term) -> String {
    match term_kind(term) {
        "uri" => format!(":{}", fragment(&term_value(term))),
        _ => term_value(term),
    }
}

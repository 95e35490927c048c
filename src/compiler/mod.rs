//! # Rule Compiler
//!
//! Compiles Prolog-style inference rules into SPARQL CONSTRUCT queries so
//! that rule-based reasoning runs on any SPARQL engine.
//!
//! A rule file is a whitespace-separated sequence of rules of the form
//! `[ name : body -> head ]`. The body mixes triple patterns, built-in
//! calls, and `noValue` negation atoms; the head is a sequence of triple
//! patterns. Handles `#` and `/* ... */` comments, quoted literals, and
//! multi-line rules.
//!
//! The emitted WHERE clause always orders clauses as: triple patterns,
//! then BINDs, then FILTERs, then NOT-EXISTS filters. Some engines require
//! binders to precede the filters that consume their outputs, so this
//! ordering is part of the compiler's contract.

use std::collections::BTreeSet;
use thiserror::Error;

use crate::error::snippet;

mod builtins;

pub use builtins::is_known_builtin;

/// Rule compilation errors. One failing rule aborts compilation of the
/// enclosing file.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("parse error in rule '{rule}': {message} (near: {context})")]
    Parse {
        rule: String,
        message: String,
        context: String,
    },

    #[error("unknown built-in '{builtin}' in rule '{rule}'")]
    UnknownBuiltin { rule: String, builtin: String },

    #[error("head variable {variable} in rule '{rule}' is not bound by the body")]
    UnboundHeadVariable { rule: String, variable: String },
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// A single rule compiled down to a CONSTRUCT query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    pub name: String,
    pub sparql: String,
}

/// A triple pattern with terms kept in source spelling
/// (variables, prefixed names, bracketed IRIs, quoted literals).
#[derive(Debug, Clone, PartialEq, Eq)]
struct TriplePattern {
    subject: String,
    predicate: String,
    object: String,
}

/// A built-in call such as `greaterThan(?x, 10)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BuiltinCall {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
}

/// One atom of a rule body.
#[derive(Debug, Clone)]
enum BodyAtom {
    Pattern(TriplePattern),
    Builtin(BuiltinCall),
    /// `noValue(s, p, o)` negation-as-failure
    NoValue(TriplePattern),
}

/// Compiler from rule syntax to SPARQL CONSTRUCT queries.
///
/// Carries the prefix table emitted at the top of every query; callers may
/// extend it with [`add_prefix`](Self::add_prefix) before compiling.
/// Compilation of identical input is character-identical across runs.
pub struct RuleCompiler {
    prefixes: Vec<(String, String)>,
    lenient: bool,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleCompiler {
    pub fn new() -> Self {
        RuleCompiler {
            prefixes: vec![
                (String::new(), "https://example.org/ns#".to_string()),
                (
                    "rdf".to_string(),
                    "http://www.w3.org/1999/02/22-rdf-syntax-ns#".to_string(),
                ),
                (
                    "rdfs".to_string(),
                    "http://www.w3.org/2000/01/rdf-schema#".to_string(),
                ),
                ("owl".to_string(), "http://www.w3.org/2002/07/owl#".to_string()),
                (
                    "xsd".to_string(),
                    "http://www.w3.org/2001/XMLSchema#".to_string(),
                ),
            ],
            lenient: false,
        }
    }

    /// When `lenient` is set, unrecognized built-ins are dropped with a
    /// warning instead of failing compilation (the historical behavior).
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Register or replace a prefix. The empty string names the default
    /// prefix (`:`).
    pub fn add_prefix(&mut self, prefix: &str, iri: &str) {
        if let Some(entry) = self.prefixes.iter_mut().find(|(p, _)| p == prefix) {
            entry.1 = iri.to_string();
        } else {
            self.prefixes.push((prefix.to_string(), iri.to_string()));
        }
    }

    /// Compile every rule in `content`, in source order.
    pub fn compile(&self, content: &str) -> CompileResult<Vec<CompiledRule>> {
        let content = strip_block_comments(content);
        let content = strip_line_comments(&content);

        split_rules(&content)?
            .iter()
            .map(|rule_text| self.compile_rule(rule_text))
            .collect()
    }

    /// Compile the text between one pair of rule brackets.
    fn compile_rule(&self, text: &str) -> CompileResult<CompiledRule> {
        let (name, body_text, head_text) = split_rule_parts(text)?;

        let body = parse_body_atoms(&name, body_text)?;
        if body.is_empty() {
            return Err(CompileError::Parse {
                rule: name,
                message: "rule has an empty body".to_string(),
                context: snippet(text),
            });
        }

        let head = parse_head_patterns(&name, head_text)?;
        if head.is_empty() {
            return Err(CompileError::Parse {
                rule: name,
                message: "rule has an empty head".to_string(),
                context: snippet(text),
            });
        }

        self.check_head_bound(&name, &body, &head)?;
        let sparql = self.generate_sparql(&name, &body, &head)?;
        Ok(CompiledRule { name, sparql })
    }

    /// Every head variable must come from a positive triple pattern or from
    /// a binder built-in's output.
    fn check_head_bound(
        &self,
        rule: &str,
        body: &[BodyAtom],
        head: &[TriplePattern],
    ) -> CompileResult<()> {
        let mut bound = BTreeSet::new();
        for atom in body {
            match atom {
                BodyAtom::Pattern(tp) => {
                    for term in [&tp.subject, &tp.predicate, &tp.object] {
                        if term.starts_with('?') {
                            bound.insert(term.clone());
                        }
                    }
                }
                BodyAtom::Builtin(call) => {
                    if let Some(out) = builtins::binder_output(call) {
                        bound.insert(out.to_string());
                    }
                }
                BodyAtom::NoValue(_) => {}
            }
        }

        for tp in head {
            for term in [&tp.subject, &tp.predicate, &tp.object] {
                if term.starts_with('?') && !bound.contains(term) {
                    return Err(CompileError::UnboundHeadVariable {
                        rule: rule.to_string(),
                        variable: term.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Emit the CONSTRUCT query for one parsed rule.
    fn generate_sparql(
        &self,
        name: &str,
        body: &[BodyAtom],
        head: &[TriplePattern],
    ) -> CompileResult<String> {
        let mut patterns = Vec::new();
        let mut binds = Vec::new();
        let mut filters = Vec::new();
        let mut not_exists = Vec::new();

        for atom in body {
            match atom {
                BodyAtom::Pattern(tp) => patterns.push(format!(
                    "{} {} {}",
                    tp.subject,
                    tp.predicate,
                    format_value(&tp.object)
                )),
                BodyAtom::Builtin(call) => {
                    match builtins::translate(name, call, self.lenient)? {
                        Some(builtins::Translation::Bind(b)) => binds.push(b),
                        Some(builtins::Translation::Filter(f)) => filters.push(f),
                        None => {}
                    }
                }
                BodyAtom::NoValue(tp) => not_exists.push(format!(
                    "FILTER(NOT EXISTS {{ {} {} {} }})",
                    tp.subject,
                    tp.predicate,
                    format_value(&tp.object)
                )),
            }
        }

        let mut out = String::new();
        out.push_str(&format!("# Rule: {name}\n"));
        for (prefix, iri) in &self.prefixes {
            out.push_str(&format!("PREFIX {prefix}: <{iri}>\n"));
        }
        out.push('\n');

        out.push_str("CONSTRUCT {\n");
        for tp in head {
            out.push_str(&format!(
                "    {} {} {} .\n",
                tp.subject,
                tp.predicate,
                format_value(&tp.object)
            ));
        }
        out.push_str("}\n");

        out.push_str("WHERE {\n");
        for pattern in &patterns {
            out.push_str(&format!("    {pattern} .\n"));
        }
        for bind in &binds {
            out.push_str(&format!("    {bind}\n"));
        }
        for filter in &filters {
            out.push_str(&format!("    {filter}\n"));
        }
        for clause in &not_exists {
            out.push_str(&format!("    {clause}\n"));
        }
        out.push('}');

        Ok(out)
    }
}

/// Normalize object values for SPARQL: bare boolean literals become typed
/// xsd:boolean literals, everything else passes through unchanged.
fn format_value(value: &str) -> String {
    match value {
        "true" | "<true>" => "\"true\"^^xsd:boolean".to_string(),
        "false" | "<false>" => "\"false\"^^xsd:boolean".to_string(),
        _ => value.to_string(),
    }
}

/// Strip `/* ... */` comments, keeping string literals intact and
/// preserving line structure so downstream errors point at the right rule.
fn strip_block_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut depth = 0u32;
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if c == '"' && depth == 0 {
            in_string = !in_string;
            result.push(c);
        } else if in_string {
            result.push(c);
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            depth += 1;
        } else if c == '*' && chars.peek() == Some(&'/') && depth > 0 {
            chars.next();
            depth -= 1;
            if depth == 0 {
                result.push(' ');
            }
        } else if depth == 0 {
            result.push(c);
        } else if c == '\n' {
            result.push('\n');
        }
    }

    result
}

/// Strip `#` line comments. A `#` inside a quoted literal or inside an
/// angle-bracketed IRI is content, not a comment.
fn strip_line_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for (i, line) in source.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut quote: Option<char> = None;
        let mut in_angle = false;
        let mut cut = line.len();
        for (pos, c) in line.char_indices() {
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '<' => in_angle = true,
                    '>' => in_angle = false,
                    '#' if !in_angle => {
                        cut = pos;
                        break;
                    }
                    _ => {}
                },
            }
        }
        out.push_str(line[..cut].trim_end());
    }
    out
}

/// Split comment-free source into the text of each bracketed rule.
///
/// Brackets may span lines; nesting is rejected, as is any stray text
/// between rules.
fn split_rules(source: &str) -> CompileResult<Vec<String>> {
    let mut rules = Vec::new();
    let mut current = String::new();
    let mut in_rule = false;
    let mut quote: Option<char> = None;

    for c in source.chars() {
        if !in_rule {
            if c == '[' {
                in_rule = true;
                current.clear();
            } else if !c.is_whitespace() {
                return Err(CompileError::Parse {
                    rule: "(input)".to_string(),
                    message: format!("unexpected '{c}' outside rule brackets"),
                    context: snippet(source),
                });
            }
            continue;
        }

        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' => {
                    return Err(CompileError::Parse {
                        rule: "(input)".to_string(),
                        message: "nested brackets are not allowed inside a rule".to_string(),
                        context: snippet(&current),
                    });
                }
                ']' => {
                    in_rule = false;
                    rules.push(current.trim().to_string());
                }
                _ => current.push(c),
            },
        }
    }

    if in_rule {
        return Err(CompileError::Parse {
            rule: "(input)".to_string(),
            message: "unterminated rule (missing ']')".to_string(),
            context: snippet(&current),
        });
    }

    Ok(rules)
}

/// Cut `name : body -> head` into its three parts, honoring quotes and
/// parenthesis depth.
fn split_rule_parts(text: &str) -> CompileResult<(String, &str, &str)> {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut name_end = None;

    for (pos, c) in text.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                ':' if depth == 0 => {
                    name_end = Some(pos);
                    break;
                }
                _ => {}
            },
        }
        if depth > 0 && name_end.is_none() && c == '(' {
            // A pattern before any ':' means the rule has no name.
            break;
        }
    }

    let Some(name_end) = name_end else {
        return Err(CompileError::Parse {
            rule: "(unnamed)".to_string(),
            message: "rule is missing a 'name :' prefix".to_string(),
            context: snippet(text),
        });
    };

    let name = text[..name_end].trim().to_string();
    if name.chars().any(char::is_whitespace) {
        return Err(CompileError::Parse {
            rule: name.clone(),
            message: "malformed rule name".to_string(),
            context: snippet(text),
        });
    }

    let rest = &text[name_end + 1..];

    // First top-level "->" separates body from head.
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut arrow = None;
    let bytes = rest.as_bytes();
    for (pos, c) in rest.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                '-' if depth == 0 && bytes.get(pos + 1) == Some(&b'>') => {
                    arrow = Some(pos);
                    break;
                }
                _ => {}
            },
        }
    }

    let Some(arrow) = arrow else {
        return Err(CompileError::Parse {
            rule: name,
            message: "rule is missing '->'".to_string(),
            context: snippet(text),
        });
    };

    Ok((name, &rest[..arrow], &rest[arrow + 2..]))
}

/// Split a body or head into its atoms: each atom ends at the `)` that
/// returns the parenthesis depth to zero.
fn split_atoms(rule: &str, text: &str) -> CompileResult<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0i32;

    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            },
        }
        current.push(c);

        if depth == 0 && quote.is_none() && c == ')' {
            parts.push(current.trim().to_string());
            current.clear();
        }
    }

    if depth != 0 {
        return Err(CompileError::Parse {
            rule: rule.to_string(),
            message: "unbalanced parentheses".to_string(),
            context: snippet(text),
        });
    }
    let leftover = current.trim();
    if !leftover.is_empty() {
        return Err(CompileError::Parse {
            rule: rule.to_string(),
            message: format!("unrecognized trailing text '{}'", snippet(leftover)),
            context: snippet(text),
        });
    }

    Ok(parts.into_iter().filter(|p| !p.is_empty()).collect())
}

fn parse_body_atoms(rule: &str, text: &str) -> CompileResult<Vec<BodyAtom>> {
    let mut atoms = Vec::new();
    for part in split_atoms(rule, text)? {
        if part.starts_with('(') {
            atoms.push(BodyAtom::Pattern(parse_triple(rule, &part)?));
        } else if let Some(call) = parse_builtin_call(&part) {
            if call.name == "noValue" {
                atoms.push(BodyAtom::NoValue(novalue_pattern(rule, &part, call)?));
            } else {
                atoms.push(BodyAtom::Builtin(call));
            }
        } else {
            return Err(CompileError::Parse {
                rule: rule.to_string(),
                message: "unrecognized body atom".to_string(),
                context: snippet(&part),
            });
        }
    }
    Ok(atoms)
}

fn parse_head_patterns(rule: &str, text: &str) -> CompileResult<Vec<TriplePattern>> {
    let mut patterns = Vec::new();
    for part in split_atoms(rule, text)? {
        if !part.starts_with('(') {
            return Err(CompileError::Parse {
                rule: rule.to_string(),
                message: "only triple patterns may appear in a rule head".to_string(),
                context: snippet(&part),
            });
        }
        patterns.push(parse_triple(rule, &part)?);
    }
    Ok(patterns)
}

/// Parse a `( term term term )` pattern, keeping quoted literals whole.
fn parse_triple(rule: &str, part: &str) -> CompileResult<TriplePattern> {
    let inner = part
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(part)
        .trim();

    let mut terms = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in inner.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if (c == '"' || c == '\'') => {
                quote = Some(c);
                current.push(c);
            }
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    terms.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        terms.push(current);
    }

    if terms.len() != 3 {
        return Err(CompileError::Parse {
            rule: rule.to_string(),
            message: format!("invalid triple pattern ({} terms, expected 3)", terms.len()),
            context: snippet(part),
        });
    }

    let mut it = terms.into_iter();
    Ok(TriplePattern {
        subject: it.next().unwrap_or_default(),
        predicate: it.next().unwrap_or_default(),
        object: it.next().unwrap_or_default(),
    })
}

/// Recognize `name( args )` and split the comma-separated arguments,
/// respecting nested parentheses and backslash-escaped quotes.
fn parse_builtin_call(part: &str) -> Option<BuiltinCall> {
    use regex::Regex;
    use std::sync::OnceLock;

    static CALL: OnceLock<Regex> = OnceLock::new();
    let call = CALL
        .get_or_init(|| Regex::new(r"(?s)^(\w+)\s*\((.*)\)$").expect("builtin call regex is valid"));

    let captures = call.captures(part.trim())?;
    let name = captures.get(1)?.as_str().to_string();
    let args_str = captures.get(2)?.as_str();

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quotes = false;

    for c in args_str.chars() {
        if c == '"' && !current.ends_with('\\') {
            in_quotes = !in_quotes;
            current.push(c);
            continue;
        }
        if !in_quotes {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    args.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            }
        }
        current.push(c);
    }
    let last = current.trim();
    if !last.is_empty() {
        args.push(last.to_string());
    }

    Some(BuiltinCall { name, args })
}

/// `noValue` takes `(s, p, o)` or a single space-separated `(s p o)` form.
fn novalue_pattern(rule: &str, part: &str, call: BuiltinCall) -> CompileResult<TriplePattern> {
    let args = if call.args.len() == 1 {
        call.args[0]
            .split_whitespace()
            .map(str::to_string)
            .collect::<Vec<_>>()
    } else {
        call.args
    };

    if args.len() != 3 {
        return Err(CompileError::Parse {
            rule: rule.to_string(),
            message: format!("noValue expects three arguments, got {}", args.len()),
            context: snippet(part),
        });
    }

    let mut it = args.into_iter();
    Ok(TriplePattern {
        subject: it.next().unwrap_or_default(),
        predicate: it.next().unwrap_or_default(),
        object: it.next().unwrap_or_default(),
    })
}

//! Translation table from rule built-ins to SPARQL expressions.
//!
//! Built-ins are pure functions over terms, each classified as a *filter*
//! (compiles to `FILTER(...)`) or a *binder* (compiles to
//! `BIND(... AS ?var)`).

use tracing::warn;

use super::{BuiltinCall, CompileError, CompileResult};

/// A translated built-in, routed into the WHERE clause bucket its class
/// dictates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Translation {
    Filter(String),
    Bind(String),
}

/// Whether `name` is a recognized built-in.
pub fn is_known_builtin(name: &str) -> bool {
    matches!(
        name,
        "greaterThan"
            | "lessThan"
            | "le"
            | "ge"
            | "equal"
            | "notEqual"
            | "regex"
            | "strConcat"
            | "uriConcat"
            | "isLiteral"
            | "isURI"
            | "isBNode"
            | "notBNode"
            | "sum"
            | "difference"
            | "product"
            | "quotient"
            | "now"
            | "makeTemp"
            | "makeSkolem"
            | "listContains"
            | "noValue"
    )
}

/// The variable a binder built-in introduces, if any.
pub(super) fn binder_output(call: &BuiltinCall) -> Option<&str> {
    let out = match call.name.as_str() {
        "strConcat" | "uriConcat" => call.args.last(),
        "sum" | "difference" | "product" | "quotient" => call.args.get(2),
        "now" | "makeTemp" | "makeSkolem" => call.args.first(),
        _ => None,
    }?;
    out.starts_with('?').then_some(out.as_str())
}

/// Translate one built-in call. Returns `None` only when `lenient` is set
/// and the built-in is unrecognized.
pub(super) fn translate(
    rule: &str,
    call: &BuiltinCall,
    lenient: bool,
) -> CompileResult<Option<Translation>> {
    let args = &call.args;
    let arity = |n: usize| -> CompileResult<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(CompileError::Parse {
                rule: rule.to_string(),
                message: format!(
                    "built-in '{}' expects {n} arguments, got {}",
                    call.name,
                    args.len()
                ),
                context: crate::error::snippet(&args.join(", ")),
            })
        }
    };
    let at_least = |n: usize| -> CompileResult<()> {
        if args.len() >= n {
            Ok(())
        } else {
            Err(CompileError::Parse {
                rule: rule.to_string(),
                message: format!(
                    "built-in '{}' expects at least {n} arguments, got {}",
                    call.name,
                    args.len()
                ),
                context: crate::error::snippet(&args.join(", ")),
            })
        }
    };

    let translation = match call.name.as_str() {
        // Comparisons
        "greaterThan" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} > {})", args[0], args[1]))
        }
        "lessThan" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} < {})", args[0], args[1]))
        }
        "le" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} <= {})", args[0], args[1]))
        }
        "ge" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} >= {})", args[0], args[1]))
        }
        "equal" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} = {})", args[0], args[1]))
        }
        "notEqual" => {
            arity(2)?;
            Translation::Filter(format!("FILTER({} != {})", args[0], args[1]))
        }

        // String operations
        "regex" => {
            arity(2)?;
            Translation::Filter(format!("FILTER(REGEX({}, {}))", args[0], args[1]))
        }
        "strConcat" => {
            at_least(2)?;
            let inputs = args[..args.len() - 1].join(", ");
            let out = &args[args.len() - 1];
            Translation::Bind(format!("BIND(CONCAT({inputs}) AS {out})"))
        }
        "uriConcat" => {
            at_least(2)?;
            let inputs = args[..args.len() - 1].join(", ");
            let out = &args[args.len() - 1];
            Translation::Bind(format!("BIND(IRI(CONCAT({inputs})) AS {out})"))
        }

        // Type predicates
        "isLiteral" => {
            arity(1)?;
            Translation::Filter(format!("FILTER(isLiteral({}))", args[0]))
        }
        "isURI" => {
            arity(1)?;
            Translation::Filter(format!("FILTER(isIRI({}))", args[0]))
        }
        "isBNode" => {
            arity(1)?;
            Translation::Filter(format!("FILTER(isBlank({}))", args[0]))
        }
        "notBNode" => {
            arity(1)?;
            Translation::Filter(format!("FILTER(!isBlank({}))", args[0]))
        }

        // Arithmetic
        "sum" => {
            arity(3)?;
            Translation::Bind(format!("BIND(({} + {}) AS {})", args[0], args[1], args[2]))
        }
        "difference" => {
            arity(3)?;
            Translation::Bind(format!("BIND(({} - {}) AS {})", args[0], args[1], args[2]))
        }
        "product" => {
            arity(3)?;
            Translation::Bind(format!("BIND(({} * {}) AS {})", args[0], args[1], args[2]))
        }
        "quotient" => {
            arity(3)?;
            Translation::Bind(format!("BIND(({} / {}) AS {})", args[0], args[1], args[2]))
        }

        // Temporal
        "now" => {
            arity(1)?;
            Translation::Bind(format!("BIND(NOW() AS {})", args[0]))
        }

        // Identity constructors
        "makeTemp" => {
            arity(1)?;
            Translation::Bind(format!("BIND(BNODE() AS {})", args[0]))
        }
        "makeSkolem" => {
            at_least(1)?;
            make_skolem(args)
        }

        // List membership via property path
        "listContains" => {
            arity(2)?;
            Translation::Filter(format!(
                "FILTER(EXISTS {{ {} rdf:rest*/rdf:first {} }})",
                args[0], args[1]
            ))
        }

        _ => {
            if lenient {
                warn!(rule, builtin = %call.name, "dropping unrecognized built-in");
                return Ok(None);
            }
            return Err(CompileError::UnknownBuiltin {
                rule: rule.to_string(),
                builtin: call.name.clone(),
            });
        }
    };

    Ok(Some(translation))
}

/// `makeSkolem(?out, a, b, ...)` deterministically mints an IRI from its
/// arguments. Variables go through `ENCODE_FOR_URI(STR(...))` so both IRIs
/// and literals are safe; with no inputs it degrades to a fresh blank node.
fn make_skolem(args: &[String]) -> Translation {
    if args.len() == 1 {
        return Translation::Bind(format!("BIND(BNODE() AS {})", args[0]));
    }

    let parts: Vec<String> = args[1..]
        .iter()
        .map(|arg| {
            if arg.starts_with('?') {
                format!("ENCODE_FOR_URI(STR({arg}))")
            } else if arg.starts_with('"') && arg.ends_with('"') {
                arg.clone()
            } else {
                format!("\"{arg}\"")
            }
        })
        .collect();

    Translation::Bind(format!(
        "BIND(IRI(CONCAT(\"urn:skolem:\", {})) AS {})",
        parts.join(", \"_\", "),
        args[0]
    ))
}

//! Tokenizing and argument-spec parsing for client commands.

use mudmux_plugin::{ArgSpec, ArgType, ArgValue, CommandArgs, Nargs};
use std::fmt;

/// Why argument parsing failed; `Display` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgParseError {
    /// A required argument had no token.
    Missing(String),
    /// A token did not coerce to the declared type.
    BadValue {
        /// Argument name.
        name: String,
        /// The offending token.
        given: String,
        /// Expected type label.
        expected: &'static str,
    },
    /// A token was outside the declared choice set.
    BadChoice {
        /// Argument name.
        name: String,
        /// The offending token.
        given: String,
        /// Allowed values.
        choices: Vec<String>,
    },
    /// Tokens were left over after all arguments were filled.
    Extra(Vec<String>),
}

impl fmt::Display for ArgParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required argument '{name}'"),
            Self::BadValue {
                name,
                given,
                expected,
            } => write!(f, "argument '{name}': {given:?} is not a valid {expected}"),
            Self::BadChoice {
                name,
                given,
                choices,
            } => write!(
                f,
                "argument '{name}': {given:?} is not one of {}",
                choices.join(", ")
            ),
            Self::Extra(tokens) => write!(f, "unexpected arguments: {}", tokens.join(" ")),
        }
    }
}

/// Splits a command tail into tokens, honoring double quotes.
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn coerce(spec: &ArgSpec, token: &str) -> Result<ArgValue, ArgParseError> {
    if !spec.choices.is_empty() && !spec.choices.iter().any(|c| c == token) {
        return Err(ArgParseError::BadChoice {
            name: spec.name.clone(),
            given: token.to_string(),
            choices: spec.choices.clone(),
        });
    }
    match spec.arg_type {
        ArgType::Str => Ok(ArgValue::Str(token.to_string())),
        ArgType::Int => token
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| ArgParseError::BadValue {
                name: spec.name.clone(),
                given: token.to_string(),
                expected: "integer",
            }),
        ArgType::Bool => match token.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(ArgValue::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(ArgValue::Bool(false)),
            _ => Err(ArgParseError::BadValue {
                name: spec.name.clone(),
                given: token.to_string(),
                expected: "boolean",
            }),
        },
    }
}

/// Parses tokens against an argument spec list.
///
/// Arguments fill in declaration order; a `Remainder` argument
/// swallows everything left. Missing optional arguments take their
/// defaults.
///
/// # Errors
///
/// The first problem found, as an [`ArgParseError`].
pub fn parse_args(specs: &[ArgSpec], tokens: &[String]) -> Result<CommandArgs, ArgParseError> {
    let mut args = CommandArgs::new();
    let mut cursor = 0usize;

    for spec in specs {
        match spec.nargs {
            Nargs::Remainder => {
                let rest = tokens[cursor..].join(" ");
                cursor = tokens.len();
                let value = if rest.is_empty() {
                    spec.default
                        .clone()
                        .unwrap_or(ArgValue::Str(String::new()))
                } else {
                    ArgValue::Str(rest)
                };
                args.insert(spec.name.clone(), value);
            }
            Nargs::One | Nargs::Optional => {
                if cursor < tokens.len() {
                    let value = coerce(spec, &tokens[cursor])?;
                    cursor += 1;
                    args.insert(spec.name.clone(), value);
                } else if let Some(default) = &spec.default {
                    args.insert(spec.name.clone(), default.clone());
                } else if spec.nargs == Nargs::One {
                    return Err(ArgParseError::Missing(spec.name.clone()));
                }
            }
        }
    }

    if cursor < tokens.len() {
        return Err(ArgParseError::Extra(tokens[cursor..].to_vec()));
    }
    Ok(args)
}

/// Builds the usage lines for a command's help and error messages.
#[must_use]
pub fn usage(plugin: &str, command: &str, description: &str, specs: &[ArgSpec]) -> Vec<String> {
    let mut parts = vec![format!("{plugin}.{command}")];
    for spec in specs {
        let shown = match spec.nargs {
            Nargs::One => format!("<{}>", spec.name),
            Nargs::Optional => format!("[{}]", spec.name),
            Nargs::Remainder => format!("[{}...]", spec.name),
        };
        parts.push(shown);
    }

    let mut lines = vec![format!("usage: {}", parts.join(" "))];
    if !description.is_empty() {
        lines.push(format!("  {description}"));
    }
    for spec in specs {
        if !spec.help.is_empty() {
            lines.push(format!("  {:<12} {}", spec.name, spec.help));
        }
    }
    lines
}

//! The validation rule set.
//!
//! Rule strings like `"min:3"` or `"unique:users,email"` are parsed into the
//! typed [`Rule`] enum when a schema is built, so a typo in a rule name is a
//! startup failure instead of a check that silently never runs.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::fmt;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]{2,}$").expect("email regex must compile");
}

/// A single parsed validation rule. `required` and `nullable` are field
/// modifiers handled by the schema, not rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// String length at least N bytes.
    Min(usize),
    /// String length at most N bytes.
    Max(usize),
    /// RFC-plausible email address.
    Email,
    /// Integer or float, numeric strings coerced to JSON numbers.
    Numeric,
    /// `true`/`false`/`1`/`0` in bool, integer, or string form; coerced to a
    /// JSON bool.
    Boolean,
    /// Value must be one of the listed options.
    In(Vec<String>),
    /// Strict calendar date matching the given format (`Y-m-d` style spec,
    /// pre-translated to a chrono pattern). Empty values pass; pairing with
    /// `nullable` is how optional dates are expressed.
    DateFormat { spec: String, pattern: String },
    /// At least 8 chars, ASCII letters and digits only, with lowercase,
    /// uppercase, and a digit each present.
    PasswordStrength,
    /// No other row may hold this value in `table.column`; rows with
    /// `id = except_id` are ignored. Resolved through the validator's probe.
    Unique {
        table: String,
        column: String,
        except_id: Option<i64>,
    },
}

/// Why a rule string failed to parse.
#[derive(Debug, PartialEq)]
pub enum RuleError {
    Unknown(String),
    BadArgument { rule: &'static str, detail: String },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleError::Unknown(name) => write!(f, "unknown validation rule `{}`", name),
            RuleError::BadArgument { rule, detail } => {
                write!(f, "bad argument for rule `{}`: {}", rule, detail)
            }
        }
    }
}

fn bad(rule: &'static str, detail: impl Into<String>) -> RuleError {
    RuleError::BadArgument {
        rule,
        detail: detail.into(),
    }
}

fn parse_length(rule: &'static str, args: Option<&str>) -> Result<usize, RuleError> {
    args.ok_or_else(|| bad(rule, "missing length"))?
        .parse()
        .map_err(|_| bad(rule, "length must be a non-negative integer"))
}

/// Only plain lowercase identifiers may reach the SQL built by the unique
/// probe.
fn is_sql_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c == '_')
}

/// Translates a `Y-m-d` style date spec into a chrono pattern. Only date
/// components are supported; anything else is a schema error.
fn date_pattern(spec: &str) -> Result<String, RuleError> {
    let mut pattern = String::with_capacity(spec.len() * 2);
    for c in spec.chars() {
        match c {
            'Y' => pattern.push_str("%Y"),
            'm' => pattern.push_str("%m"),
            'd' => pattern.push_str("%d"),
            c if c.is_ascii_alphanumeric() => {
                return Err(bad(
                    "date_format",
                    format!("unsupported format component `{}`", c),
                ));
            }
            c => pattern.push(c),
        }
    }
    Ok(pattern)
}

impl Rule {
    /// Parses one rule string, e.g. `"max:255"` or
    /// `"unique:users,email,except_id:7"`.
    pub fn parse(spec: &str) -> Result<Rule, RuleError> {
        let (name, args) = match spec.split_once(':') {
            Some((name, args)) => (name, Some(args)),
            None => (spec, None),
        };

        match name {
            "min" => Ok(Rule::Min(parse_length("min", args)?)),
            "max" => Ok(Rule::Max(parse_length("max", args)?)),
            "email" => Ok(Rule::Email),
            "numeric" => Ok(Rule::Numeric),
            "boolean" => Ok(Rule::Boolean),
            "password_strength" => Ok(Rule::PasswordStrength),
            "in" => {
                let args = args.ok_or_else(|| bad("in", "missing options"))?;
                let options: Vec<String> = args.split(',').map(String::from).collect();
                if options.iter().any(|o| o.is_empty()) {
                    return Err(bad("in", "empty option"));
                }
                Ok(Rule::In(options))
            }
            "date_format" => {
                let spec = args.ok_or_else(|| bad("date_format", "missing format"))?;
                Ok(Rule::DateFormat {
                    spec: spec.to_string(),
                    pattern: date_pattern(spec)?,
                })
            }
            "unique" => {
                let args = args.ok_or_else(|| bad("unique", "missing table,column"))?;
                let mut parts = args.split(',');
                let table = parts.next().unwrap_or_default().to_string();
                let column = parts.next().unwrap_or_default().to_string();
                if !is_sql_identifier(&table) || !is_sql_identifier(&column) {
                    return Err(bad("unique", format!("bad table or column in `{}`", args)));
                }
                let except_id = match parts.next() {
                    None => None,
                    Some(extra) => match extra.strip_prefix("except_id:") {
                        Some(id) => Some(
                            id.parse::<i64>()
                                .map_err(|_| bad("unique", "except_id must be an integer"))?,
                        ),
                        None => return Err(bad("unique", format!("unexpected argument `{}`", extra))),
                    },
                };
                if parts.next().is_some() {
                    return Err(bad("unique", "too many arguments"));
                }
                Ok(Rule::Unique {
                    table,
                    column,
                    except_id,
                })
            }
            other => Err(RuleError::Unknown(other.to_string())),
        }
    }

    /// Applies the rule to a sanitized value.
    ///
    /// `Ok(Some(v))` replaces the stored value (the coercing rules),
    /// `Ok(None)` passes unchanged, `Err` carries the client-facing message.
    /// `Unique` is the one rule with I/O behind it and is resolved by the
    /// validator through its probe; it always passes here.
    pub fn check(&self, display: &str, value: &Value) -> Result<Option<Value>, String> {
        match self {
            Rule::Min(n) => {
                if text_of(value).len() >= *n {
                    Ok(None)
                } else {
                    Err(format!(
                        "{} must be at least {} characters long.",
                        display, n
                    ))
                }
            }
            Rule::Max(n) => {
                if text_of(value).len() <= *n {
                    Ok(None)
                } else {
                    Err(format!("{} must not exceed {} characters.", display, n))
                }
            }
            Rule::Email => {
                if EMAIL_REGEX.is_match(&text_of(value)) {
                    Ok(None)
                } else {
                    Err(format!("{} must be a valid email address.", display))
                }
            }
            Rule::Numeric => coerce_numeric(value)
                .map(Some)
                .ok_or_else(|| format!("{} must be a number.", display)),
            Rule::Boolean => coerce_boolean(value).map(Some).ok_or_else(|| {
                format!("{} must be a boolean value (true/false, 0/1).", display)
            }),
            Rule::In(options) => {
                let text = text_of(value);
                if options.iter().any(|o| *o == text) {
                    Ok(None)
                } else {
                    Err(format!(
                        "{} has an invalid value. Must be one of: {}.",
                        display,
                        options.join(", ")
                    ))
                }
            }
            Rule::DateFormat { spec, pattern } => {
                let text = text_of(value);
                if text.is_empty() {
                    return Ok(None);
                }
                match NaiveDate::parse_from_str(&text, pattern) {
                    Ok(date) if date.format(pattern).to_string() == text => Ok(None),
                    _ => Err(format!("{} must be in {} format.", display, spec)),
                }
            }
            Rule::PasswordStrength => {
                if password_is_strong(&text_of(value)) {
                    Ok(None)
                } else {
                    Err(format!(
                        "{} must be at least 8 characters, contain uppercase, lowercase, and a digit.",
                        display
                    ))
                }
            }
            Rule::Unique { .. } => Ok(None),
        }
    }
}

/// Field name as shown in messages: first letter uppercased, underscores
/// become spaces (`folder_id` → `Folder id`).
pub fn display_name(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => spaced,
    }
}

/// String view of a value for the text-oriented rules.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::Number(i.into()));
            }
            s.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn password_is_strong(value: &str) -> bool {
    value.len() >= 8
        && value.chars().all(|c| c.is_ascii_alphanumeric())
        && value.chars().any(|c| c.is_ascii_lowercase())
        && value.chars().any(|c| c.is_ascii_uppercase())
        && value.chars().any(|c| c.is_ascii_digit())
}

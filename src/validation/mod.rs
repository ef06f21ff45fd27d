//!
//! # Request Validation
//!
//! This module implements the schema-driven validation pipeline every write
//! endpoint runs its JSON body through:
//!
//! 1. each field is sanitized (trim, strip tags, HTML-escape),
//! 2. `nullable` empties normalize to `null` and skip the rest,
//! 3. `required` empties fail with a field message,
//! 4. the remaining rules run in declared order, stopping at the first
//!    failure for that field while other fields keep collecting errors,
//! 5. `numeric`/`boolean` successes replace the value with its coerced form.
//!
//! Schemas are compiled once at startup via [`Schema::build`]; a misspelled
//! rule is a boot failure, not a check that silently never runs. Uniqueness
//! is the one rule that needs I/O and goes through the injected
//! [`UniqueProbe`].

pub mod rules;
pub mod sanitize;

use crate::error::{ApiError, FieldErrors};
use async_trait::async_trait;
use rules::{display_name, text_of, Rule, RuleError};
use sanitize::{is_empty, sanitize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Checks value uniqueness against whatever backs the data. Implemented by
/// each store backend.
#[async_trait]
pub trait UniqueProbe: Send + Sync {
    /// True if some row other than `except_id` already holds `value` in
    /// `table.column`. Both identifiers were vetted at schema-build time.
    async fn exists(
        &self,
        table: &str,
        column: &str,
        value: &str,
        except_id: Option<i64>,
    ) -> Result<bool, ApiError>;
}

#[derive(Debug, Clone)]
struct FieldRules {
    name: String,
    required: bool,
    nullable: bool,
    rules: Vec<Rule>,
}

/// An ordered set of per-field rules, compiled from rule strings.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldRules>,
}

/// A rule string that failed to compile, with the field it belongs to.
#[derive(Debug)]
pub struct SchemaError {
    pub field: String,
    pub source: RuleError,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid rules for field `{}`: {}", self.field, self.source)
    }
}

impl Schema {
    /// Compiles `(field, [rule strings])` pairs. Any unknown rule or bad
    /// argument fails the whole schema.
    pub fn build(spec: &[(&str, &[&str])]) -> Result<Schema, SchemaError> {
        let mut fields = Vec::with_capacity(spec.len());
        for (name, rule_specs) in spec {
            let mut field = FieldRules {
                name: (*name).to_string(),
                required: false,
                nullable: false,
                rules: Vec::new(),
            };
            for rule_spec in *rule_specs {
                match *rule_spec {
                    "required" => field.required = true,
                    "nullable" => field.nullable = true,
                    other => field.rules.push(Rule::parse(other).map_err(|source| {
                        SchemaError {
                            field: field.name.clone(),
                            source,
                        }
                    })?),
                }
            }
            fields.push(field);
        }
        Ok(Schema { fields })
    }

    /// Copy of this schema with the `unique` rule on `field` excluding `id`,
    /// for self-updates that must not collide with themselves.
    pub fn with_except_id(&self, field: &str, id: i64) -> Schema {
        let mut schema = self.clone();
        for f in &mut schema.fields {
            if f.name != field {
                continue;
            }
            for rule in &mut f.rules {
                if let Rule::Unique { except_id, .. } = rule {
                    *except_id = Some(id);
                }
            }
        }
        schema
    }
}

/// Sanitized, validated, possibly coerced field values.
#[derive(Debug)]
pub struct Validated {
    values: HashMap<String, Value>,
}

impl Validated {
    /// The field as a string slice; empty for anything non-textual. Intended
    /// for fields whose rules guarantee a string.
    pub fn str(&self, field: &str) -> &str {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The field as a string, `None` when normalized to null.
    pub fn opt_str(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(Value::as_str)
    }

    /// The field as an integer, `None` when null or fractional.
    pub fn opt_int(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(Value::as_i64)
    }

    /// Whether the field took part in validation (partial runs only include
    /// fields present in the body).
    pub fn has(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Raw access for the less common shapes.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// Runs schemas against JSON bodies. Cheap to clone; handlers share one.
#[derive(Clone)]
pub struct Validator {
    probe: Arc<dyn UniqueProbe>,
}

impl Validator {
    pub fn new(probe: Arc<dyn UniqueProbe>) -> Self {
        Self { probe }
    }

    /// Validates every schema field against `body` (create semantics:
    /// missing fields count as null and trip `required`).
    pub async fn validate(&self, schema: &Schema, body: &Value) -> Result<Validated, ApiError> {
        self.run(schema.fields.iter().collect(), body).await
    }

    /// Validates only the schema fields present in `body` (update semantics;
    /// a field explicitly set to `null` is present). No usable field at all
    /// is a 400.
    pub async fn validate_partial(
        &self,
        schema: &Schema,
        body: &Value,
    ) -> Result<Validated, ApiError> {
        let present: Vec<&FieldRules> = schema
            .fields
            .iter()
            .filter(|f| body.get(&f.name).is_some())
            .collect();
        if present.is_empty() {
            return Err(ApiError::BadRequest("No data provided for update.".into()));
        }
        self.run(present, body).await
    }

    async fn run(&self, fields: Vec<&FieldRules>, body: &Value) -> Result<Validated, ApiError> {
        let mut errors = FieldErrors::new();
        let mut values = HashMap::new();

        for field in fields {
            let raw = body.get(&field.name).cloned().unwrap_or(Value::Null);
            let mut value = sanitize(&raw);
            let display = display_name(&field.name);

            if field.nullable && is_empty(&value) {
                values.insert(field.name.clone(), Value::Null);
                continue;
            }
            if field.required && is_empty(&value) {
                errors
                    .entry(field.name.clone())
                    .or_default()
                    .push(format!("{} is required.", display));
                continue;
            }

            for rule in &field.rules {
                let outcome = match rule {
                    Rule::Unique {
                        table,
                        column,
                        except_id,
                    } => self.check_unique(table, column, *except_id, &display, &value).await,
                    other => other.check(&display, &value),
                };
                match outcome {
                    Ok(Some(coerced)) => value = coerced,
                    Ok(None) => {}
                    Err(message) => {
                        errors.entry(field.name.clone()).or_default().push(message);
                        break;
                    }
                }
            }

            values.insert(field.name.clone(), value);
        }

        if errors.is_empty() {
            Ok(Validated { values })
        } else {
            Err(ApiError::ValidationFailed(errors))
        }
    }

    async fn check_unique(
        &self,
        table: &str,
        column: &str,
        except_id: Option<i64>,
        display: &str,
        value: &Value,
    ) -> Result<Option<Value>, String> {
        match self
            .probe
            .exists(table, column, &text_of(value), except_id)
            .await
        {
            Ok(false) => Ok(None),
            Ok(true) => Err(format!("{} already exists.", display)),
            Err(err) => {
                log::error!("Unique check failed for {}.{}: {}", table, column, err);
                Err("A database error occurred during unique validation.".to_string())
            }
        }
    }
}

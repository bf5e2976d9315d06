//! Route param and search validation.
//!
//! Three validator shapes are accepted: a standard schema (`validate`
//! returning a value or issues), a parse-style schema (`parse` plus an
//! optional non-throwing `safe_parse`), and a plain function. The shape is
//! resolved once into a [`Validator`] when the route module registers it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn at(mut self, field: impl Into<String>) -> Self {
        self.path.push(field.into());
        self
    }
}

/// A schema exposing a standard `validate` entry point.
pub trait StandardSchema: Send + Sync {
    fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>>;
}

/// A parse-style schema.
pub trait ParseSchema: Send + Sync {
    fn parse(&self, input: &Value) -> Result<Value, Issue>;

    /// Non-throwing variant, preferred over `parse` when provided.
    fn safe_parse(&self, _input: &Value) -> Option<Result<Value, Issue>> {
        None
    }
}

pub type ValidatorFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Whatever a route file exported under `validateParams`/`validateSearch`.
///
/// Each probe returns the shape the export supports, if any.
pub trait ValidatorExport {
    fn as_standard(&self) -> Option<Arc<dyn StandardSchema>> {
        None
    }

    fn as_parser(&self) -> Option<Arc<dyn ParseSchema>> {
        None
    }

    fn as_function(&self) -> Option<ValidatorFn> {
        None
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidatorConfigError {
    #[error("`{name}` is not a standard schema, parse schema or function")]
    Unrecognized { name: String },
}

/// A validator with its shape already resolved.
#[derive(Clone)]
pub enum Validator {
    Standard(Arc<dyn StandardSchema>),
    Parser(Arc<dyn ParseSchema>),
    Function(ValidatorFn),
}

impl Validator {
    pub fn standard(schema: impl StandardSchema + 'static) -> Self {
        Validator::Standard(Arc::new(schema))
    }

    pub fn parser(schema: impl ParseSchema + 'static) -> Self {
        Validator::Parser(Arc::new(schema))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Validator::Function(Arc::new(f))
    }

    /// Resolves an export in precedence order: standard schema, then parse
    /// schema, then function.
    pub fn resolve(
        name: &str,
        export: &dyn ValidatorExport,
    ) -> Result<Self, ValidatorConfigError> {
        if let Some(schema) = export.as_standard() {
            return Ok(Validator::Standard(schema));
        }
        if let Some(schema) = export.as_parser() {
            return Ok(Validator::Parser(schema));
        }
        if let Some(f) = export.as_function() {
            return Ok(Validator::Function(f));
        }
        Err(ValidatorConfigError::Unrecognized {
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Standard(_) => f.write_str("Validator::Standard"),
            Validator::Parser(_) => f.write_str("Validator::Parser"),
            Validator::Function(_) => f.write_str("Validator::Function"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationTarget {
    Params,
    Search,
}

impl fmt::Display for ValidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationTarget::Params => f.write_str("route param"),
            ValidationTarget::Search => f.write_str("search param"),
        }
    }
}

/// Validation failure carrying the raw input and every issue.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    pub target: ValidationTarget,
    pub message: String,
    pub input: Value,
    pub issues: Vec<Issue>,
}

impl ValidationError {
    fn new(target: ValidationTarget, input: &Value, issues: Vec<Issue>) -> Self {
        Self {
            target,
            message: format!("{} validation failed", target),
            input: input.clone(),
            issues,
        }
    }
}

/// Runs `validator` on `input`.
///
/// ```
/// use onyx_router::validate::{validate, ValidationTarget, Validator};
/// use serde_json::json;
///
/// let positive = Validator::function(|v| match v["page"].as_str().and_then(|p| p.parse::<u32>().ok()) {
///     Some(page) if page > 0 => Ok(json!({ "page": page })),
///     _ => Err("page must be a positive number".into()),
/// });
///
/// let out = validate(&positive, ValidationTarget::Search, &json!({ "page": "3" })).unwrap();
/// assert_eq!(out, json!({ "page": 3 }));
///
/// let err = validate(&positive, ValidationTarget::Search, &json!({ "page": "0" })).unwrap_err();
/// assert_eq!(err.issues[0].message, "page must be a positive number");
/// ```
pub fn validate(
    validator: &Validator,
    target: ValidationTarget,
    input: &Value,
) -> Result<Value, ValidationError> {
    match validator {
        Validator::Standard(schema) => schema
            .validate(input)
            .map_err(|issues| ValidationError::new(target, input, issues)),
        Validator::Parser(schema) => {
            let parsed = match schema.safe_parse(input) {
                Some(result) => result,
                None => schema.parse(input),
            };
            parsed.map_err(|issue| ValidationError::new(target, input, vec![issue]))
        }
        Validator::Function(f) => {
            f(input).map_err(|message| ValidationError::new(target, input, vec![Issue::new(message)]))
        }
    }
}

/// Parse schema that substitutes `fallback` whenever `schema` rejects.
pub struct WithFallback<S> {
    schema: S,
    fallback: Value,
}

impl<S: ParseSchema> ParseSchema for WithFallback<S> {
    fn parse(&self, input: &Value) -> Result<Value, Issue> {
        Ok(self
            .schema
            .parse(input)
            .unwrap_or_else(|_| self.fallback.clone()))
    }

    fn safe_parse(&self, input: &Value) -> Option<Result<Value, Issue>> {
        Some(self.parse(input))
    }
}

/// The only way to turn a validation failure into a default value.
pub fn with_fallback<S: ParseSchema>(schema: S, fallback: Value) -> WithFallback<S> {
    WithFallback { schema, fallback }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Numeric;

    impl ParseSchema for Numeric {
        fn parse(&self, input: &Value) -> Result<Value, Issue> {
            input
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(Value::from)
                .ok_or_else(|| Issue::new("expected a number"))
        }
    }

    struct SafeOnly;

    impl ParseSchema for SafeOnly {
        fn parse(&self, _: &Value) -> Result<Value, Issue> {
            Err(Issue::new("parse should not run"))
        }

        fn safe_parse(&self, input: &Value) -> Option<Result<Value, Issue>> {
            Some(Ok(input.clone()))
        }
    }

    struct RequiresId;

    impl StandardSchema for RequiresId {
        fn validate(&self, input: &Value) -> Result<Value, Vec<Issue>> {
            if input.get("id").is_some() {
                Ok(input.clone())
            } else {
                Err(vec![Issue::new("required").at("id")])
            }
        }
    }

    /// Exposes both a standard schema and a parser.
    struct Both;

    impl ValidatorExport for Both {
        fn as_standard(&self) -> Option<Arc<dyn StandardSchema>> {
            Some(Arc::new(RequiresId))
        }

        fn as_parser(&self) -> Option<Arc<dyn ParseSchema>> {
            Some(Arc::new(Numeric))
        }
    }

    struct Nothing;

    impl ValidatorExport for Nothing {}

    #[test]
    fn standard_schema_takes_precedence() {
        let validator = Validator::resolve("validateParams", &Both).unwrap();
        assert!(matches!(validator, Validator::Standard(_)));
    }

    #[test]
    fn unrecognized_shape_is_config_error() {
        let err = Validator::resolve("validateSearch", &Nothing).unwrap_err();
        assert_eq!(
            err,
            ValidatorConfigError::Unrecognized {
                name: "validateSearch".into()
            }
        );
    }

    #[test]
    fn failure_keeps_raw_input_and_issues() {
        let input = json!({ "slug": "x" });
        let err = validate(
            &Validator::standard(RequiresId),
            ValidationTarget::Params,
            &input,
        )
        .unwrap_err();
        assert_eq!(err.message, "route param validation failed");
        assert_eq!(err.input, input);
        assert_eq!(err.issues, vec![Issue::new("required").at("id")]);
    }

    #[test]
    fn safe_parse_is_preferred() {
        let out = validate(&Validator::parser(SafeOnly), ValidationTarget::Search, &json!(1)).unwrap();
        assert_eq!(out, json!(1));
    }

    #[test]
    fn parse_errors_become_validation_errors() {
        let err = validate(&Validator::parser(Numeric), ValidationTarget::Search, &json!("abc"))
            .unwrap_err();
        assert_eq!(err.target, ValidationTarget::Search);
        assert_eq!(err.to_string(), "search param validation failed");
    }

    #[test]
    fn fallback_substitutes_default() {
        let schema = Validator::parser(with_fallback(Numeric, json!(1)));
        assert_eq!(
            validate(&schema, ValidationTarget::Search, &json!("abc")).unwrap(),
            json!(1)
        );
        assert_eq!(
            validate(&schema, ValidationTarget::Search, &json!("7")).unwrap(),
            json!(7)
        );
    }
}

//! Loader result wire format.
//!
//! A client-side navigation fetches route data as a small JavaScript module.
//! Successful data is inlined as a literal:
//!
//! ```text
//! export function loader() { return {"title":"Hello"} }
//! ```
//!
//! A redirect or not-found result produces a module whose literal holds only
//! a marker object, so nothing computed by the loader can reach the client.
//! Signal modules open with a `signal` export; data modules never do, so data
//! that happens to use a marker key still reads back as data.
//!
//! ```text
//! export const signal = true;
//! export function loader() { return {"__onyxNotFound":true} }
//! ```

use serde_json::{json, Value};

use crate::module::LoaderError;

const MODULE_PREFIX: &str = "export function loader() { return ";
const MODULE_SUFFIX: &str = " }";
const SIGNAL_HEADER: &str = "export const signal = true;\n";

pub const REDIRECT_MARKER: &str = "__onyxRedirect";
pub const REDIRECT_STATUS_MARKER: &str = "__onyxRedirectStatus";
pub const NOT_FOUND_MARKER: &str = "__onyxNotFound";

/// Outcome of a loader run.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderResult {
    Data(Value),
    Redirect { location: String, status: u16 },
    NotFound,
}

impl LoaderResult {
    /// Classifies a loader outcome. Failures other than a file-not-found
    /// I/O error are handed back to the caller.
    pub fn from_outcome(outcome: Result<Value, LoaderError>) -> Result<Self, anyhow::Error> {
        match outcome {
            Ok(data) => Ok(LoaderResult::Data(data)),
            Err(LoaderError::Redirect { location, status }) => {
                Ok(LoaderResult::Redirect { location, status })
            }
            Err(err) if err.is_not_found() => Ok(LoaderResult::NotFound),
            Err(LoaderError::Failed(err)) => Err(err),
            Err(LoaderError::NotFound) => Ok(LoaderResult::NotFound),
        }
    }

    pub fn is_signal(&self) -> bool {
        !matches!(self, LoaderResult::Data(_))
    }

    /// Serializes into the module sent to client-side navigations.
    pub fn to_module(&self) -> String {
        let (header, literal) = match self {
            LoaderResult::Data(data) => ("", data.clone()),
            LoaderResult::Redirect { location, status } => (
                SIGNAL_HEADER,
                json!({
                    REDIRECT_MARKER: location,
                    REDIRECT_STATUS_MARKER: status,
                }),
            ),
            LoaderResult::NotFound => (SIGNAL_HEADER, json!({ NOT_FOUND_MARKER: true })),
        };
        format!(
            "{}{}{}{}",
            header,
            MODULE_PREFIX,
            script_safe_json(&literal),
            MODULE_SUFFIX
        )
    }

    /// Reads a module produced by [`to_module`](Self::to_module).
    pub fn from_module(source: &str) -> Option<Self> {
        let source = source.trim();
        let (signal, body) = match source.strip_prefix(SIGNAL_HEADER) {
            Some(rest) => (true, rest),
            None => (false, source),
        };
        let literal = body
            .strip_prefix(MODULE_PREFIX)?
            .strip_suffix(MODULE_SUFFIX)?;
        let value: Value = serde_json::from_str(literal).ok()?;
        if !signal {
            return Some(LoaderResult::Data(value));
        }

        if let Some(location) = value.get(REDIRECT_MARKER).and_then(Value::as_str) {
            let status = value
                .get(REDIRECT_STATUS_MARKER)
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(302);
            return Some(LoaderResult::Redirect {
                location: location.to_string(),
                status,
            });
        }
        if value.get(NOT_FOUND_MARKER).and_then(Value::as_bool) == Some(true) {
            return Some(LoaderResult::NotFound);
        }
        None
    }
}

/// JSON text that can be embedded in a script: `<` and the JS line
/// separators are escaped.
pub(crate) fn script_safe_json(value: &Value) -> String {
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{not_found, redirect};
    use pretty_assertions::assert_eq;

    #[test]
    fn data_module() {
        let module = LoaderResult::Data(json!({ "title": "</script><b>" })).to_module();
        assert_eq!(
            module,
            r#"export function loader() { return {"title":"\u003c/script>\u003cb>"} }"#
        );
        assert_eq!(
            LoaderResult::from_module(&module),
            Some(LoaderResult::Data(json!({ "title": "</script><b>" })))
        );
    }

    #[test]
    fn signal_modules_carry_only_markers() {
        let redirect = LoaderResult::Redirect {
            location: "/login".into(),
            status: 307,
        };
        assert_eq!(
            redirect.to_module(),
            "export const signal = true;\n\
             export function loader() { return {\"__onyxRedirect\":\"/login\",\"__onyxRedirectStatus\":307} }"
        );
        assert_eq!(LoaderResult::from_module(&redirect.to_module()), Some(redirect));

        assert_eq!(
            LoaderResult::NotFound.to_module(),
            "export const signal = true;\n\
             export function loader() { return {\"__onyxNotFound\":true} }"
        );
    }

    #[test]
    fn data_with_marker_keys_stays_data() {
        for data in [
            json!({ NOT_FOUND_MARKER: true }),
            json!({ REDIRECT_MARKER: "/elsewhere", "title": "kept" }),
        ] {
            let module = LoaderResult::Data(data.clone()).to_module();
            assert!(!module.contains("signal"));
            assert_eq!(
                LoaderResult::from_module(&module),
                Some(LoaderResult::Data(data))
            );
        }
    }

    #[test]
    fn classifies_outcomes() {
        assert_eq!(
            LoaderResult::from_outcome(Err(redirect("/a"))).unwrap(),
            LoaderResult::Redirect {
                location: "/a".into(),
                status: 302
            }
        );
        assert_eq!(
            LoaderResult::from_outcome(Err(not_found())).unwrap(),
            LoaderResult::NotFound
        );

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            LoaderResult::from_outcome(Err(io.into())).unwrap(),
            LoaderResult::NotFound
        );

        let failed = LoaderError::Failed(anyhow::anyhow!("db down"));
        assert_eq!(
            LoaderResult::from_outcome(Err(failed)).unwrap_err().to_string(),
            "db down"
        );
    }

    #[test]
    fn rejects_foreign_modules() {
        assert_eq!(LoaderResult::from_module("console.log(1)"), None);
    }
}

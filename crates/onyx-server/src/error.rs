// ./crates/onyx-server/src/error.rs
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use onyx_router::{Issue, ManifestError, ValidationError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("loader for `{file}` failed")]
    Loader {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("handler for `{file}` failed")]
    Handler {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("render failed for `{path}`")]
    Render {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("loader redirected to an invalid location `{0}`")]
    InvalidRedirect(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("route discovery failed: {0}")]
    Rebuild(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<Issue>,
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            DispatchError::Validation(err) => ErrorBody {
                error: err.message,
                issues: err.issues,
            },
            other => {
                error!(error = ?anyhow::Error::from(other), "Request dispatch failed");
                ErrorBody {
                    error: "Internal Server Error".to_string(),
                    issues: Vec::new(),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

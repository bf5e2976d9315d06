//! Route-module exports as seen by the dispatcher.
//!
//! The bundler collaborator loads a route file and hands over what it
//! exports: a `loader`, `generateStaticParams`, per-method API handlers,
//! a loading policy and optional validators.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use onyx_router::{Params, RouteExports, Validator, ValidatorConfigError, ValidatorExport};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What a loader receives.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoaderProps {
    pub params: Params,
    pub search: Map<String, Value>,
    pub path: String,
    pub href: String,
}

/// How a loader ends when it does not return data.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("redirect to {location} ({status})")]
    Redirect { location: String, status: u16 },

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::Failed(err.into())
    }
}

impl LoaderError {
    /// True for an explicit not-found signal and for any failure caused by a
    /// file-not-found I/O error.
    pub fn is_not_found(&self) -> bool {
        match self {
            LoaderError::NotFound => true,
            LoaderError::Redirect { .. } => false,
            LoaderError::Failed(err) => err.chain().any(|cause| {
                cause
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
            }),
        }
    }
}

/// Temporary (302) redirect signal.
pub fn redirect(location: impl Into<String>) -> LoaderError {
    redirect_with_status(location, 302)
}

pub fn redirect_with_status(location: impl Into<String>, status: u16) -> LoaderError {
    LoaderError::Redirect {
        location: location.into(),
        status,
    }
}

pub fn not_found() -> LoaderError {
    LoaderError::NotFound
}

#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, props: LoaderProps) -> Result<Value, LoaderError>;
}

#[async_trait]
impl<F, Fut> Loader for F
where
    F: Fn(LoaderProps) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, LoaderError>> + Send + 'static,
{
    async fn load(&self, props: LoaderProps) -> Result<Value, LoaderError> {
        (self)(props).await
    }
}

/// `generateStaticParams`: the parameter sets to prerender.
#[async_trait]
pub trait StaticParams: Send + Sync {
    async fn generate(&self) -> anyhow::Result<Vec<Params>>;
}

#[async_trait]
impl<F, Fut> StaticParams for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<Params>>> + Send + 'static,
{
    async fn generate(&self) -> anyhow::Result<Vec<Params>> {
        (self)().await
    }
}

/// Request handed to an API handler.
#[derive(Debug)]
pub struct ApiRequest {
    pub request: Request<Body>,
    pub params: Params,
}

/// What an API handler may return. Text and JSON get wrapped by the
/// dispatcher.
#[derive(Debug)]
pub enum ApiReply {
    Response(Response),
    Text(String),
    Json(Value),
}

impl From<Response> for ApiReply {
    fn from(response: Response) -> Self {
        ApiReply::Response(response)
    }
}

impl From<String> for ApiReply {
    fn from(text: String) -> Self {
        ApiReply::Text(text)
    }
}

impl From<&str> for ApiReply {
    fn from(text: &str) -> Self {
        ApiReply::Text(text.to_string())
    }
}

impl From<Value> for ApiReply {
    fn from(value: Value) -> Self {
        ApiReply::Json(value)
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        match self {
            ApiReply::Response(response) => response,
            ApiReply::Text(text) => (StatusCode::OK, text).into_response(),
            ApiReply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        }
    }
}

#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiReply>;
}

#[async_trait]
impl<F, Fut> ApiHandler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ApiReply>> + Send + 'static,
{
    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiReply> {
        (self)(request).await
    }
}

/// When a page waits for its loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingPolicy {
    /// Respond after the loader finishes.
    Blocking,
    /// Respond immediately; the client fetches the data.
    Instant,
    /// Wait at most this long, then respond without data.
    Timed(Duration),
}

/// Everything a route file exports.
#[derive(Clone, Default)]
pub struct RouteModule {
    pub loader: Option<Arc<dyn Loader>>,
    pub generate_static_params: Option<Arc<dyn StaticParams>>,
    pub handlers: HashMap<Method, Arc<dyn ApiHandler>>,
    pub default_handler: Option<Arc<dyn ApiHandler>>,
    pub loading: Option<LoadingPolicy>,
    pub validate_params: Option<Validator>,
    pub validate_search: Option<Validator>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn with_static_params(mut self, generate: impl StaticParams + 'static) -> Self {
        self.generate_static_params = Some(Arc::new(generate));
        self
    }

    pub fn with_handler(mut self, method: Method, handler: impl ApiHandler + 'static) -> Self {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    /// Handler for methods without their own.
    pub fn with_default_handler(mut self, handler: impl ApiHandler + 'static) -> Self {
        self.default_handler = Some(Arc::new(handler));
        self
    }

    pub fn with_loading(mut self, policy: LoadingPolicy) -> Self {
        self.loading = Some(policy);
        self
    }

    pub fn with_param_validator(mut self, validator: Validator) -> Self {
        self.validate_params = Some(validator);
        self
    }

    pub fn with_search_validator(mut self, validator: Validator) -> Self {
        self.validate_search = Some(validator);
        self
    }

    /// Resolves a raw `validateParams` export; an unrecognized shape fails
    /// registration.
    pub fn try_with_param_export(
        self,
        export: &dyn ValidatorExport,
    ) -> Result<Self, ValidatorConfigError> {
        Ok(self.with_param_validator(Validator::resolve("validateParams", export)?))
    }

    pub fn try_with_search_export(
        self,
        export: &dyn ValidatorExport,
    ) -> Result<Self, ValidatorConfigError> {
        Ok(self.with_search_validator(Validator::resolve("validateSearch", export)?))
    }

    /// Exports visible to route classification.
    pub fn exports(&self) -> RouteExports {
        RouteExports {
            loader: self.loader.is_some(),
            generate_static_params: self.generate_static_params.is_some(),
        }
    }

    pub fn handler_for(&self, method: &Method) -> Option<&Arc<dyn ApiHandler>> {
        self.handlers.get(method).or(self.default_handler.as_ref())
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("loader", &self.loader.is_some())
            .field("generate_static_params", &self.generate_static_params.is_some())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("default_handler", &self.default_handler.is_some())
            .field("loading", &self.loading)
            .field("validate_params", &self.validate_params)
            .field("validate_search", &self.validate_search)
            .finish()
    }
}

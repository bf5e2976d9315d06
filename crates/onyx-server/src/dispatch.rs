//! Request dispatch.
//!
//! Per request: match a manifest entry, pick the strategy, run the loader
//! under the route's loading policy, and turn loader signals into responses.
//!
//! ```text
//! MATCH -> STRATEGY -> { API | LOADER + RENDER | SHELL } -> RESPONSE
//! ```
//!
//! A redirect becomes a bodiless 3xx (or a marker-only loader module) and a
//! not-found signal renders the nearest `+not-found` boundary with 404. No
//! response built from a signal ever carries loader data.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use onyx_router::loader_path::{decode_loader_path, is_loader_path};
use onyx_router::path::split_href;
use onyx_router::route::pattern::compile_pattern;
use onyx_router::search::parse_search_string;
use onyx_router::{
    normalize_path, validate, ManifestEntry, ManifestError, MaskEngine, Params, Resolution,
    RouteKind, RouteMatch, ValidationError, ValidationTarget,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DispatchError;
use crate::module::{ApiRequest, Loader, LoaderProps, LoadingPolicy, RouteModule};
use crate::protocol::{script_safe_json, LoaderResult};
use crate::sink::{write_response, BufferedSink};
use crate::table::{RouteTable, Snapshot};

const HTML: &str = "text/html; charset=utf-8";
const JAVASCRIPT: &str = "text/javascript; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    Ssg,
    Ssr,
    /// Client-only shell.
    Spa,
    /// A `+not-found` boundary.
    NotFound,
}

/// Input to the render collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderContext {
    pub mode: RenderMode,
    pub entry: ManifestEntry,
    pub props: LoaderProps,
    /// `None` when the client is expected to fetch the data itself.
    pub loader_data: Option<Value>,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, context: RenderContext) -> anyhow::Result<String>;
}

/// Minimal HTML shell: a root element plus the loader data as JSON.
#[derive(Debug, Clone, Default)]
pub struct ShellRenderer;

#[async_trait]
impl Renderer for ShellRenderer {
    async fn render(&self, context: RenderContext) -> anyhow::Result<String> {
        let data = script_safe_json(context.loader_data.as_ref().unwrap_or(&Value::Null));
        Ok(format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body>\
             <div id=\"root\" data-route=\"{}\"></div>\
             <script id=\"__onyx_data\" type=\"application/json\">{}</script>\
             </body></html>",
            context.entry.page.replace('"', "&quot;"),
            data
        ))
    }
}

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Paths under these prefixes are left to other handlers.
    pub ignore_prefixes: Vec<String>,
    /// Policy for routes that do not declare one.
    pub loading: LoadingPolicy,
    /// Body for a miss with no boundary anywhere.
    pub not_found_html: String,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        DispatchOptions::from(&Config::default())
    }
}

impl From<&Config> for DispatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            ignore_prefixes: config.routing.ignore_prefixes.clone(),
            loading: config.loading.policy(),
            not_found_html: config.server.not_found_html.clone(),
        }
    }
}

/// One prerendered SSG page.
#[derive(Debug, Clone, PartialEq)]
pub struct PrerenderedPage {
    pub path: String,
    pub status: StatusCode,
    pub html: String,
    /// Set when the loader redirected.
    pub redirect: Option<String>,
}

impl PrerenderedPage {
    /// Redirects and non-2xx pages are not written out.
    pub fn is_skipped(&self) -> bool {
        self.redirect.is_some() || !self.status.is_success()
    }
}

pub struct Dispatcher {
    table: RouteTable,
    renderer: Arc<dyn Renderer>,
    masks: MaskEngine,
    options: DispatchOptions,
}

fn html_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, HTML)], body).into_response()
}

fn module_response(result: &LoaderResult) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, JAVASCRIPT)],
        result.to_module(),
    )
        .into_response()
}

fn redirect_response(location: &str, status: u16) -> Result<Response, DispatchError> {
    let status = StatusCode::from_u16(status)
        .ok()
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);
    let location = HeaderValue::from_str(location)
        .map_err(|_| DispatchError::InvalidRedirect(location.to_string()))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

fn params_value(params: &Params) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect(),
    )
}

fn validate_props(module: &RouteModule, props: &LoaderProps) -> Result<(), ValidationError> {
    if let Some(validator) = &module.validate_params {
        validate(validator, ValidationTarget::Params, &params_value(&props.params))?;
    }
    if let Some(validator) = &module.validate_search {
        validate(
            validator,
            ValidationTarget::Search,
            &Value::Object(props.search.clone()),
        )?;
    }
    Ok(())
}

impl Dispatcher {
    pub fn new(table: RouteTable, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            table,
            renderer,
            masks: MaskEngine::default(),
            options: DispatchOptions::default(),
        }
    }

    pub fn with_masks(mut self, masks: MaskEngine) -> Self {
        self.masks = masks;
        self
    }

    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    fn is_ignored(&self, path: &str) -> bool {
        self.options
            .ignore_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Dispatches one request. `Ok(None)` means the request is not for the
    /// router: an ignored prefix, or a non-GET request to a page.
    pub async fn handle(&self, request: Request<Body>) -> Result<Option<Response>, DispatchError> {
        let path = request.uri().path().to_string();
        if self.is_ignored(&path) {
            debug!(path, "Ignoring request");
            return Ok(None);
        }

        let snapshot = self.table.current().await;

        if let Some(found) = snapshot.matcher.match_api(&path) {
            return self.invoke_api(&snapshot, found, request).await.map(Some);
        }

        if request.method() != Method::GET && request.method() != Method::HEAD {
            return Ok(None);
        }

        if is_loader_path(&path) {
            let query = request.uri().query().unwrap_or("");
            return self.serve_loader(&snapshot, &path, query).await.map(Some);
        }

        let href = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or(path);
        self.render_page(&snapshot, &href).await.map(Some)
    }

    /// Like [`handle`](Self::handle) but always produces a response.
    pub async fn respond(&self, request: Request<Body>) -> Response {
        let method = request.method().clone();
        match self.handle(request).await {
            Ok(Some(response)) => response,
            Ok(None) if method == Method::GET || method == Method::HEAD => {
                StatusCode::NOT_FOUND.into_response()
            }
            Ok(None) => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            Err(err) => err.into_response(),
        }
    }

    /// Axum router that sends every request through the dispatcher.
    pub fn router(self: Arc<Self>) -> axum::Router {
        axum::Router::new().fallback(move |request: Request<Body>| {
            let dispatcher = self.clone();
            async move { dispatcher.respond(request).await }
        })
    }

    async fn invoke_api(
        &self,
        snapshot: &Snapshot,
        found: RouteMatch<'_>,
        request: Request<Body>,
    ) -> Result<Response, DispatchError> {
        let RouteMatch { entry, params } = found;
        let handler = snapshot
            .module(&entry.file)
            .and_then(|module| module.handler_for(request.method()))
            .cloned();

        let mut response = match handler {
            None => {
                warn!(file = %entry.file, method = %request.method(), "No handler for method");
                StatusCode::METHOD_NOT_ALLOWED.into_response()
            }
            Some(handler) => {
                debug!(file = %entry.file, "Invoking API handler");
                handler
                    .handle(ApiRequest { request, params })
                    .await
                    .map_err(|source| DispatchError::Handler {
                        file: entry.file.clone(),
                        source,
                    })?
                    .into_response()
            }
        };

        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(response)
    }

    async fn serve_loader(
        &self,
        snapshot: &Snapshot,
        path: &str,
        query: &str,
    ) -> Result<Response, DispatchError> {
        let Some(decoded) = decode_loader_path(path) else {
            return Ok(module_response(&LoaderResult::NotFound));
        };
        let target = self.masks.resolve_initial(&decoded, None);

        let Some(RouteMatch { entry, params }) = snapshot.matcher.match_page(&target) else {
            debug!(path = %target, "Loader request for unknown route");
            return Ok(module_response(&LoaderResult::NotFound));
        };

        let props = LoaderProps {
            params,
            search: parse_search_string(query),
            href: target.clone(),
            path: target,
        };

        let module = snapshot.module(&entry.file);
        if let Some(module) = module {
            validate_props(module, &props)?;
        }

        let result = match module.and_then(|m| m.loader.clone()) {
            Some(loader) => self.run_loader(&entry.file, loader, props).await?,
            None => LoaderResult::Data(Value::Null),
        };
        Ok(module_response(&result))
    }

    async fn run_loader(
        &self,
        file: &str,
        loader: Arc<dyn Loader>,
        props: LoaderProps,
    ) -> Result<LoaderResult, DispatchError> {
        let path = props.path.clone();
        let result = LoaderResult::from_outcome(loader.load(props).await).map_err(|source| {
            DispatchError::Loader {
                file: file.to_string(),
                source,
            }
        })?;

        match &result {
            LoaderResult::Redirect { location, status } => {
                info!(path, file, location = %location, status, "Loader redirected")
            }
            LoaderResult::NotFound => info!(path, file, "Loader signalled not found"),
            LoaderResult::Data(_) => debug!(path, file, "Loader finished"),
        }
        Ok(result)
    }

    /// Runs the loader under `policy`. `None` means the page is sent without
    /// data.
    async fn load_with_policy(
        &self,
        file: &str,
        loader: Arc<dyn Loader>,
        props: LoaderProps,
        policy: LoadingPolicy,
    ) -> Result<Option<LoaderResult>, DispatchError> {
        match policy {
            LoadingPolicy::Blocking => self.run_loader(file, loader, props).await.map(Some),
            LoadingPolicy::Instant => Ok(None),
            LoadingPolicy::Timed(limit) => {
                match tokio::time::timeout(limit, self.run_loader(file, loader, props)).await {
                    Ok(result) => result.map(Some),
                    Err(_) => {
                        debug!(file, ?limit, "Loader exceeded wait, responding without data");
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn render(
        &self,
        mode: RenderMode,
        entry: &ManifestEntry,
        props: LoaderProps,
        loader_data: Option<Value>,
    ) -> Result<String, DispatchError> {
        let path = props.path.clone();
        self.renderer
            .render(RenderContext {
                mode,
                entry: entry.clone(),
                props,
                loader_data,
            })
            .await
            .map_err(|source| DispatchError::Render { path, source })
    }

    fn default_not_found(&self) -> Response {
        html_response(StatusCode::NOT_FOUND, self.options.not_found_html.clone())
    }

    /// 404 page for `props.path`: the nearest boundary, else the default.
    async fn render_not_found(
        &self,
        snapshot: &Snapshot,
        props: LoaderProps,
    ) -> Result<Response, DispatchError> {
        match snapshot.matcher.nearest_boundary(&props.path) {
            Some(RouteMatch { entry, params }) => {
                debug!(path = %props.path, boundary = %entry.file, "Rendering not-found boundary");
                let props = LoaderProps { params, ..props };
                let html = self.render(RenderMode::NotFound, entry, props, None).await?;
                Ok(html_response(StatusCode::NOT_FOUND, html))
            }
            None => Ok(self.default_not_found()),
        }
    }

    async fn render_page(&self, snapshot: &Snapshot, href: &str) -> Result<Response, DispatchError> {
        let (raw_path, query) = split_href(href);
        let path = normalize_path(raw_path).into_owned();
        let target = self.masks.resolve_initial(&path, None);
        let search = query.map(parse_search_string).unwrap_or_else(Map::new);

        let props = LoaderProps {
            params: Params::new(),
            search,
            path: target.clone(),
            href: href.to_string(),
        };

        match snapshot.matcher.resolve(&target) {
            Resolution::Route(RouteMatch { entry, params }) => {
                debug!(path = %target, file = %entry.file, kind = ?entry.kind, "Matched route");
                let props = LoaderProps { params, ..props };
                self.render_route(snapshot, entry, props).await
            }
            Resolution::Boundary(_) => {
                debug!(path = %target, "No route matched");
                self.render_not_found(snapshot, props).await
            }
            Resolution::Default => {
                debug!(path = %target, "No route or boundary matched");
                Ok(self.default_not_found())
            }
        }
    }

    async fn render_route(
        &self,
        snapshot: &Snapshot,
        entry: &ManifestEntry,
        props: LoaderProps,
    ) -> Result<Response, DispatchError> {
        let mode = match entry.kind {
            RouteKind::Ssg => RenderMode::Ssg,
            RouteKind::Ssr => RenderMode::Ssr,
            RouteKind::Spa => {
                let html = self.render(RenderMode::Spa, entry, props, None).await?;
                return Ok(html_response(StatusCode::OK, html));
            }
            RouteKind::Api | RouteKind::NotFound => {
                return self.render_not_found(snapshot, props).await;
            }
        };

        let module = snapshot.module(&entry.file);
        if let Some(module) = module {
            validate_props(module, &props)?;
        }

        let result = match module.and_then(|m| m.loader.clone()) {
            Some(loader) => {
                let policy = module
                    .and_then(|m| m.loading)
                    .unwrap_or(self.options.loading);
                self.load_with_policy(&entry.file, loader, props.clone(), policy)
                    .await?
            }
            None => None,
        };

        match result {
            Some(LoaderResult::Redirect { location, status }) => {
                redirect_response(&location, status)
            }
            Some(LoaderResult::NotFound) => self.render_not_found(snapshot, props).await,
            Some(LoaderResult::Data(data)) => {
                let html = self.render(mode, entry, props, Some(data)).await?;
                Ok(html_response(StatusCode::OK, html))
            }
            None => {
                let html = self.render(mode, entry, props, None).await?;
                Ok(html_response(StatusCode::OK, html))
            }
        }
    }

    async fn static_paths(
        &self,
        snapshot: &Snapshot,
        entry: &ManifestEntry,
    ) -> Result<Vec<String>, DispatchError> {
        if entry.route_keys.is_empty() {
            return Ok(vec![entry.page.clone()]);
        }

        let Some(generate) = snapshot
            .module(&entry.file)
            .and_then(|m| m.generate_static_params.clone())
        else {
            warn!(page = %entry.page, "Dynamic SSG route without generateStaticParams, skipping");
            return Ok(Vec::new());
        };

        let pattern = compile_pattern(&entry.page).map_err(|source| ManifestError::Pattern {
            file: entry.file.clone(),
            source,
        })?;
        let sets = generate
            .generate()
            .await
            .map_err(|source| DispatchError::Loader {
                file: entry.file.clone(),
                source,
            })?;

        Ok(sets
            .iter()
            .filter_map(|params| {
                let path = pattern.try_interpolate(params);
                if path.is_none() {
                    warn!(page = %entry.page, ?params, "Static params missing a segment");
                }
                path
            })
            .collect())
    }

    /// Renders every SSG page: static routes directly, dynamic ones once per
    /// `generateStaticParams` entry.
    pub async fn prerender(&self) -> Result<Vec<PrerenderedPage>, DispatchError> {
        let snapshot = self.table.current().await;
        let mut pages = Vec::new();

        for compiled in snapshot.matcher.pages() {
            let entry = compiled.entry();
            if entry.kind != RouteKind::Ssg {
                continue;
            }

            for path in self.static_paths(&snapshot, entry).await? {
                let response = self.render_page(&snapshot, &path).await?;
                let mut sink = BufferedSink::default();
                write_response(response, &mut sink)
                    .await
                    .map_err(|source| DispatchError::Render {
                        path: path.clone(),
                        source,
                    })?;

                let redirect = sink.header(header::LOCATION.as_str()).map(str::to_string);
                let status = sink.status.unwrap_or(StatusCode::OK);
                if let Some(location) = &redirect {
                    info!(path, location = %location, "Loader redirected, skipping page");
                } else if !status.is_success() {
                    info!(path, %status, "Page did not render successfully, skipping");
                }
                pages.push(PrerenderedPage {
                    status,
                    html: sink.text(),
                    path,
                    redirect,
                });
            }
        }

        info!(pages = pages.len(), "Prerender finished");
        Ok(pages)
    }
}

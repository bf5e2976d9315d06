//! # Onyx Server
//!
//! Request dispatch for Onyx route trees:
//! - **Route table**: discovery, manifest build and coalesced rebuilds
//! - **Dispatcher**: API handlers, loaders, rendering and not-found boundaries
//! - **Loader protocol**: data-free redirect and not-found modules
//! - **Masks**: renders the actual route behind a masked URL
//! - **Watcher**: rebuilds the table when route files come and go
//!
//! ## Example
//!
//! ```rust,no_run
//! use onyx_server::{Config, Dispatcher, FsRouteScanner, RouteTable, ShellRenderer};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load_default()?;
//! let scanner = FsRouteScanner::new(&config.routing.dir);
//! let table = RouteTable::load(Arc::new(scanner), config.routing.default_loader_mode.into()).await?;
//!
//! let dispatcher = Dispatcher::new(table, Arc::new(ShellRenderer))
//!     .with_masks(config.mask_engine()?)
//!     .with_options((&config).into());
//! let app = Arc::new(dispatcher).router();
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod module;
pub mod protocol;
pub mod sink;
pub mod source;
pub mod table;
pub mod watch;

pub use config::{Config, LoaderMode};
pub use dispatch::{
    DispatchOptions, Dispatcher, PrerenderedPage, RenderContext, RenderMode, Renderer,
    ShellRenderer,
};
pub use error::DispatchError;
pub use module::{
    not_found, redirect, redirect_with_status, ApiHandler, ApiReply, ApiRequest, Loader,
    LoaderError, LoaderProps, LoadingPolicy, RouteModule, StaticParams,
};
pub use protocol::LoaderResult;
pub use sink::{write_response, BufferedSink, ResponseSink};
pub use source::{sniff_exports, Discovery, FsRouteScanner, RouteRegistry, RouteSource};
pub use table::{RouteTable, Snapshot};
pub use watch::{spawn_rebuilder, ChangeType, RouteChange, RouteWatcher};

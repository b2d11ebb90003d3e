//! Kennel dog app
//!
//! The application side of the kennel workspace: a route dispatch table, HTML
//! fragment rendering and the dog domain, all running on the kennel-core
//! record store. Nothing here knows which engine is underneath; the browser
//! worker passes an IndexedDB factory, the CLI an in-memory one.
//!
//! ```rust
//! use kennel::{start, AppConfig, Method, Request};
//! use kennel_core::storage::MemoryFactory;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let service = start(&MemoryFactory::new(), AppConfig::default()).await.unwrap();
//! let response = service.handle(&Request::new(Method::GET, "/dog")).await.unwrap();
//! assert!(response.body().contains("Fireball"));
//! # });
//! ```

pub mod config;
pub mod dogs;
pub mod error;
pub mod html;
pub mod request;
pub mod router;

pub use config::{AppConfig, MigrationPolicy};
pub use dogs::{start, Dog, DogController, DogRoute, DogService};
pub use error::{AppError, Result};
pub use http::{Method, StatusCode};
pub use request::{Request, Response};
pub use router::{RouteMatch, Router};

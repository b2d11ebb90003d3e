//! Dog domain
//!
//! One `dogs` object store keyed by an auto-generated `id`, with non-unique
//! `breed-index` and `name-index` indexes.

pub mod controller;
pub mod model;
pub mod service;

pub use controller::DogController;
pub use model::Dog;
pub use service::{routes, start, DogRoute, DogService};

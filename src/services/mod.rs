//! Network services for the HTTP API.
//!
//! The `web` feature adds an Axum server over a single [`DcmController`]
//! shared through `SharedDcmState<P, S>` wrapped in `Arc`, so the background
//! loop that drives the controller and every request handler see the same
//! ports:
//!
//! ```ignore
//! use std::sync::Arc;
//! use brick_dcm::services::{build_router, SharedDcmState, WebServerConfig};
//!
//! let state = Arc::new(SharedDcmState::new(controller));
//! let router = build_router(Arc::clone(&state), &WebServerConfig::default());
//! ```
//!
//! [`DcmController`]: crate::DcmController

pub mod api;
pub mod shared;
pub mod web;

pub use api::*;
pub use shared::*;
pub use web::*;

//! Marketplace HTTP API module.
//!
//! # Purpose
//! Exposes the route handler modules, the shared error envelope, and the
//! request/response payload types.
pub mod branches;
pub mod cart;
pub mod error;
pub mod openapi;
pub mod superpass;
pub mod system;
pub mod types;

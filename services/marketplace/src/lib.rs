//! Marketplace service library crate.
//!
//! # Purpose
//! Exposes the branch permission, superpass, and cart API surface together
//! with auth helpers, configuration, mail delivery, and storage backends for
//! use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod mail;
pub mod model;
pub mod observability;
pub mod store;

//! Marketplace authentication modules.
//!
//! # Purpose
//! Groups bearer token verification and the caller-identity guards used by
//! the HTTP handlers.
pub mod principal;
pub mod token;

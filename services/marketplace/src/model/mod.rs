//! Marketplace data model module.
//!
//! # Purpose
//! Re-exports the branch permission, superpass, and cart aggregates used by
//! the API and store layers.
mod branch;
mod cart;
mod superpass;

pub use branch::{
    ApprovedBranch, BranchPermissionRecord, PermissionRequest, RequestDecision, RequestStatus,
};
pub use cart::{Cart, CartOp};
pub use superpass::{
    SUPERPASS_ALPHABET, SUPERPASS_CODE_LEN, SuperpassAction, SuperpassToken, Unredeemable,
    generate_code, normalize_code,
};

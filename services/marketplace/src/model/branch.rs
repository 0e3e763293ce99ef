//! Branch permission records and their request lifecycle.
//!
//! # Purpose
//! Defines the per-branch aggregate that owns cross-account permission
//! requests, plus the state machine that moves a request from `pending` to a
//! terminal decision.
//!
//! # Key invariants
//! - A request only ever leaves `pending` once; terminal states never change.
//! - Requests are kept in insertion order and are never deleted.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Decision applied by the owning branch to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Approve,
    Reject,
}

impl RequestDecision {
    pub fn status(&self) -> RequestStatus {
        match self {
            RequestDecision::Approve => RequestStatus::Approved,
            RequestDecision::Reject => RequestStatus::Rejected,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestDecision::Approve => "approve",
            RequestDecision::Reject => "reject",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub id: String,
    pub sub_branch_email: String,
    pub sub_branch_name: String,
    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub main_branch_code: String,
}

impl PermissionRequest {
    /// Build a fresh `pending` request with a time-ordered id.
    pub fn pending(
        main_branch_code: &str,
        sub_branch_email: &str,
        sub_branch_name: &str,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sub_branch_email: sub_branch_email.to_string(),
            sub_branch_name: sub_branch_name.to_string(),
            status: RequestStatus::Pending,
            requested_at,
            approved_at: None,
            rejected_at: None,
            main_branch_code: main_branch_code.to_string(),
        }
    }

    /// Apply a decision in place.
    ///
    /// Returns `false` and leaves the request untouched when it has already
    /// been decided.
    pub fn decide(&mut self, decision: RequestDecision, at: DateTime<Utc>) -> bool {
        if self.status != RequestStatus::Pending {
            return false;
        }
        self.status = decision.status();
        match decision {
            RequestDecision::Approve => self.approved_at = Some(at),
            RequestDecision::Reject => self.rejected_at = Some(at),
        }
        true
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedBranch {
    pub email: String,
    pub name: String,
    pub approved_at: DateTime<Utc>,
}

impl ApprovedBranch {
    pub fn from_request(request: &PermissionRequest, approved_at: DateTime<Utc>) -> Self {
        Self {
            email: request.sub_branch_email.clone(),
            name: request.sub_branch_name.clone(),
            approved_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BranchPermissionRecord {
    pub branch_code: String,
    pub permission_requests: Vec<PermissionRequest>,
    pub approved_branches: Vec<ApprovedBranch>,
}

impl BranchPermissionRecord {
    pub fn new(branch_code: &str) -> Self {
        Self {
            branch_code: branch_code.to_string(),
            permission_requests: Vec::new(),
            approved_branches: Vec::new(),
        }
    }

    pub fn find_request_mut(&mut self, request_id: &str) -> Option<&mut PermissionRequest> {
        self.permission_requests
            .iter_mut()
            .find(|request| request.id == request_id)
    }
}

mod common;

use axum::http::StatusCode;
use common::{TestApp, read_json};
use http_helpers::{authed_json_request, get_request, json_request};
use marketplace::store::BranchStore;
use serde_json::json;
use tower::ServiceExt;

async fn register_branch(app: &TestApp, code: &str) {
    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branches",
            &app.branch_token(code),
            json!({ "branchCode": code }),
        ))
        .await
        .expect("register");
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn request_access(app: &TestApp, code: &str, email: &str, name: &str) -> String {
    let response = app
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/branch-permissions",
            json!({
                "action": "request_access",
                "mainBranchCode": code,
                "subBranchEmail": email,
                "subBranchName": name
            }),
        ))
        .await
        .expect("request access");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    body["requestId"].as_str().expect("request id").to_string()
}

async fn fetch_branch(app: &TestApp, code: &str) -> serde_json::Value {
    let response = app
        .app
        .clone()
        .oneshot(get_request(&format!("/branch-permissions?branchCode={code}"), None))
        .await
        .expect("get branch");
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

#[tokio::test]
async fn request_access_appends_one_pending_entry() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;

    let id = request_access(&app, "MAIN", "sub@example.com", "Sub Branch").await;
    let body = fetch_branch(&app, "MAIN").await;
    let requests = body["data"]["permissionRequests"].as_array().expect("requests");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["id"], id.as_str());
    assert_eq!(requests[0]["status"], "pending");
    assert_eq!(requests[0]["subBranchEmail"], "sub@example.com");
    assert_eq!(requests[0]["mainBranchCode"], "MAIN");
    assert!(requests[0].get("approvedAt").is_none());
}

#[tokio::test]
async fn approve_changes_only_the_target_request() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;
    let first = request_access(&app, "MAIN", "a@example.com", "A").await;
    let second = request_access(&app, "MAIN", "b@example.com", "B").await;
    let third = request_access(&app, "MAIN", "c@example.com", "C").await;
    let before = fetch_branch(&app, "MAIN").await;

    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            &app.branch_token("MAIN"),
            json!({ "action": "approve_access", "mainBranchCode": "MAIN", "requestId": second }),
        ))
        .await
        .expect("approve");
    assert_eq!(response.status(), StatusCode::OK);

    let after = fetch_branch(&app, "MAIN").await;
    let before_requests = before["data"]["permissionRequests"].as_array().expect("before");
    let after_requests = after["data"]["permissionRequests"].as_array().expect("after");
    assert_eq!(after_requests[0], before_requests[0]);
    assert_eq!(after_requests[2], before_requests[2]);
    assert_eq!(after_requests[0]["id"], first.as_str());
    assert_eq!(after_requests[2]["id"], third.as_str());
    assert_eq!(after_requests[1]["status"], "approved");
    assert!(after_requests[1]["approvedAt"].is_string());

    let approved = after["data"]["approvedBranches"].as_array().expect("approved");
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0]["email"], "b@example.com");
    assert_eq!(approved[0]["name"], "B");
}

#[tokio::test]
async fn reject_then_approve_is_a_conflict() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;
    let id = request_access(&app, "MAIN", "a@example.com", "A").await;
    let token = app.branch_token("MAIN");

    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            &token,
            json!({ "action": "reject_access", "mainBranchCode": "MAIN", "requestId": id }),
        ))
        .await
        .expect("reject");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            &token,
            json!({ "action": "approve_access", "mainBranchCode": "MAIN", "requestId": id }),
        ))
        .await
        .expect("approve");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "already_resolved");

    let record = app.store.get_branch("MAIN").await.expect("record");
    assert_eq!(record.permission_requests[0].status.as_str(), "rejected");
    assert!(record.permission_requests[0].rejected_at.is_some());
    assert!(record.approved_branches.is_empty());
}

#[tokio::test]
async fn empty_email_is_rejected_and_nothing_appended() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;

    let response = app
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/branch-permissions",
            json!({
                "action": "request_access",
                "mainBranchCode": "MAIN",
                "subBranchEmail": "",
                "subBranchName": "Sub"
            }),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], "validation_error");

    let record = app.store.get_branch("MAIN").await.expect("record");
    assert!(record.permission_requests.is_empty());
}

#[tokio::test]
async fn unknown_branch_and_request_are_not_found() {
    let app = TestApp::new();
    let response = app
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/branch-permissions",
            json!({
                "action": "request_access",
                "mainBranchCode": "NOPE",
                "subBranchEmail": "a@example.com",
                "subBranchName": "A"
            }),
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    register_branch(&app, "MAIN").await;
    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            &app.branch_token("MAIN"),
            json!({ "action": "approve_access", "mainBranchCode": "MAIN", "requestId": "missing" }),
        ))
        .await
        .expect("approve");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .app
        .clone()
        .oneshot(get_request("/branch-permissions?branchCode=NOPE", None))
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn decisions_require_the_owning_branch() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;
    let id = request_access(&app, "MAIN", "a@example.com", "A").await;
    let body = json!({ "action": "approve_access", "mainBranchCode": "MAIN", "requestId": id });

    let response = app
        .app
        .clone()
        .oneshot(json_request("POST", "/branch-permissions", body.clone()))
        .await
        .expect("anonymous");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            &app.branch_token("OTHER"),
            body.clone(),
        ))
        .await
        .expect("other branch");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branch-permissions",
            "not-a-token",
            body,
        ))
        .await
        .expect("garbage token");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let record = app.store.get_branch("MAIN").await.expect("record");
    assert_eq!(record.permission_requests[0].status.as_str(), "pending");
}

#[tokio::test]
async fn malformed_commands_are_validation_errors() {
    let app = TestApp::new();
    for body in [
        json!({ "action": "delete_everything", "mainBranchCode": "MAIN" }),
        json!({ "mainBranchCode": "MAIN" }),
        json!("not an object"),
    ] {
        let response = app
            .app
            .clone()
            .oneshot(json_request("POST", "/branch-permissions", body))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["code"], "validation_error");
    }

    let response = app
        .app
        .clone()
        .oneshot(get_request("/branch-permissions", None))
        .await
        .expect("get");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registering_twice_conflicts() {
    let app = TestApp::new();
    register_branch(&app, "MAIN").await;
    let response = app
        .app
        .clone()
        .oneshot(authed_json_request(
            "POST",
            "/branches",
            &app.branch_token("MAIN"),
            json!({ "branchCode": "MAIN" }),
        ))
        .await
        .expect("register again");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(response).await["code"], "already_exists");
}

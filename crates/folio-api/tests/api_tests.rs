mod common;

use std::sync::atomic::Ordering;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use tower::ServiceExt;

use common::{OPERATOR_EMAIL, spawn_app};

const SIGNATURE: &str = "\n\n---\nBest regards,\nAda Operator\nops@example.com";

#[tokio::test]
async fn test_register_login_session() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "Jo@Example.com", "password": "hunter22", "full_name": "Jo" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "jo@example.com");
    assert_eq!(body["role"], "user");
    assert!(body["token"].is_string());

    let (status, _) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "jo@example.com", "password": "another1", "full_name": "Jo" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "jo@example.com", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, body) = app
        .call(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "JO@example.com", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.call("GET", "/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "jo@example.com");
    assert_eq!(body["full_name"], "Jo");
}

#[tokio::test]
async fn test_concurrent_registration_conflicts() {
    let app = spawn_app();
    let body = json!({ "email": "jo@example.com", "password": "hunter22", "full_name": "Jo" });

    let (first, second) = tokio::join!(
        app.call("POST", "/auth/register", None, Some(body.clone())),
        app.call("POST", "/auth/register", None, Some(body.clone())),
    );

    let mut statuses = vec![first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn test_operator_role_granted_by_email() {
    let app = spawn_app();

    let (status, body) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "OPS@example.com", "password": "operator1", "full_name": "Ada" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], OPERATOR_EMAIL);
    assert_eq!(body["role"], "operator");
}

#[tokio::test]
async fn test_registration_validation() {
    let app = spawn_app();

    let cases = [
        json!({ "email": "jo@example.com", "password": "12345", "full_name": "Jo" }),
        json!({ "email": "not-an-email", "password": "123456", "full_name": "Jo" }),
        json!({ "email": "jo@example.com", "password": "123456", "full_name": "   " }),
    ];
    for case in cases {
        let (status, body) = app.call("POST", "/auth/register", None, Some(case)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_session_required_and_operator_gate() {
    let app = spawn_app();
    let (_, user_token) = app.seed_user("jo@example.com", "Jo");

    let (status, body) = app.call("GET", "/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let (status, _) = app.call("GET", "/requests", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    for uri in ["/admin/requests", "/admin/users", "/admin/stats"] {
        let (status, body) = app.call("GET", uri, Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        assert_eq!(body["error"], "operator role required");
    }

    let (status, _) = app.call("GET", "/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_lifecycle_scenario() {
    let app = spawn_app();
    let (_, user_token) = app.seed_user("jo@example.com", "Jo");
    let (_, ops_token) = app.seed_operator();

    // Submit
    let created = app.submit(&user_token, "frontend", "Need a site").await;
    assert_eq!(created["status"], "pending");
    assert_eq!(created["answer"], serde_json::Value::Null);
    assert_eq!(created["from_user"], "jo@example.com");
    let id = created["id"].as_i64().unwrap();

    let emails = app.outbox.wait_for(1).await;
    assert_eq!(emails[0].to, OPERATOR_EMAIL);
    assert!(emails[0].content.contains("Jo (jo@example.com)"));
    assert!(emails[0].content.contains("Need a site"));

    let (_, badge) = app.call("GET", "/notifications/badge", Some(&ops_token), None).await;
    assert_eq!(badge["count"], 1);

    // Answer
    let (status, answered) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", id),
            Some(&ops_token),
            Some(json!({ "answer": "Sure, happy to help" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["status"], "answered");
    assert_eq!(answered["answer"], format!("Sure, happy to help{}", SIGNATURE));
    assert_eq!(answered["viewed_by_user"], false);

    let emails = app.outbox.wait_for(2).await;
    assert_eq!(emails[1].to, "jo@example.com");
    assert!(emails[1].content.contains("Sure, happy to help"));

    let (_, badge) = app.call("GET", "/notifications/badge", Some(&user_token), None).await;
    assert_eq!(badge["has_new"], true);
    assert_eq!(badge["count"], 1);

    // A second answer is refused
    let (status, _) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", id),
            Some(&ops_token),
            Some(json!({ "answer": "Changed my mind" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // View, twice
    for _ in 0..2 {
        let (status, viewed) = app
            .call("POST", &format!("/requests/{}/view", id), Some(&user_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(viewed["viewed_by_user"], true);
    }

    let (_, badge) = app.call("GET", "/notifications/badge", Some(&user_token), None).await;
    assert_eq!(badge["has_new"], false);

    // Answered requests cannot be deleted
    let (status, _) = app
        .call("DELETE", &format!("/requests/{}", id), Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_text_and_answer_stored_as_submitted() {
    let app = spawn_app();
    let (_, user_token) = app.seed_user("jo@example.com", "Jo");
    let (_, ops_token) = app.seed_operator();

    let created = app.submit(&user_token, "frontend", "  Need a site  ").await;
    assert_eq!(created["text"], "  Need a site  ");
    let id = created["id"].as_i64().unwrap();

    let (status, answered) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", id),
            Some(&ops_token),
            Some(json!({ "answer": "  Sure, happy to help\n" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["answer"], format!("  Sure, happy to help\n{}", SIGNATURE));
}

#[tokio::test]
async fn test_empty_answer_rejected() {
    let app = spawn_app();
    let (_, user_token) = app.seed_user("jo@example.com", "Jo");
    let (_, ops_token) = app.seed_operator();
    let id = app.submit(&user_token, "info", "Question").await["id"].as_i64().unwrap();

    let (status, _) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", id),
            Some(&ops_token),
            Some(json!({ "answer": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/admin/requests/9999/answer",
            Some(&ops_token),
            Some(json!({ "answer": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_requires_answer_and_ownership() {
    let app = spawn_app();
    let (_, owner_token) = app.seed_user("jo@example.com", "Jo");
    let (_, other_token) = app.seed_user("sam@example.com", "Sam");
    let id = app.submit(&owner_token, "info", "Question").await["id"].as_i64().unwrap();

    let (status, _) = app
        .call("POST", &format!("/requests/{}/view", id), Some(&owner_token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call("POST", &format!("/requests/{}/view", id), Some(&other_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_pending_request() {
    let app = spawn_app();
    let (_, owner_token) = app.seed_user("jo@example.com", "Jo");
    let (_, other_token) = app.seed_user("sam@example.com", "Sam");
    let id = app.submit(&owner_token, "fullstack", "Build an app").await["id"].as_i64().unwrap();

    let (status, _) = app
        .call("DELETE", &format!("/requests/{}", id), Some(&other_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .call("DELETE", &format!("/requests/{}", id), Some(&owner_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, serde_json::Value::Null);

    let (status, list) = app.call("GET", "/requests", Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 0);

    let (status, _) = app
        .call("DELETE", &format!("/requests/{}", id), Some(&owner_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_list_is_private_and_pending_first() {
    let app = spawn_app();
    let (_, jo) = app.seed_user("jo@example.com", "Jo");
    let (_, sam) = app.seed_user("sam@example.com", "Sam");
    let (_, ops) = app.seed_operator();

    let older = app.submit(&jo, "info", "First").await["id"].as_i64().unwrap();
    let newer = app.submit(&jo, "frontend", "Second").await["id"].as_i64().unwrap();
    app.submit(&sam, "info", "Not yours").await;

    let (status, _) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", newer),
            Some(&ops),
            Some(json!({ "answer": "Done" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app.call("GET", "/requests", Some(&jo), None).await;
    let ids: Vec<i64> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![older, newer]);
}

#[tokio::test]
async fn test_invalid_submissions() {
    let app = spawn_app();
    let (_, token) = app.seed_user("jo@example.com", "Jo");

    let (status, _) = app
        .call("POST", "/requests", Some(&token), Some(json!({ "plan": "info", "text": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "POST",
            "/requests",
            Some(&token),
            Some(json!({ "plan": "info", "subject": "", "text": "body" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown plan tags fail deserialization
    let (status, _) = app
        .call("POST", "/requests", Some(&token), Some(json!({ "plan": "enterprise", "text": "x" })))
        .await;
    assert!(status.is_client_error());

    let (status, body) = app
        .call(
            "POST",
            "/requests",
            Some(&token),
            Some(json!({ "plan": "info", "subject": "Quote", "text": "How much?" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["text"], "Quote\n\nHow much?");
}

#[tokio::test]
async fn test_notification_failure_keeps_request() {
    let app = spawn_app();
    let (_, token) = app.seed_user("jo@example.com", "Jo");
    let (_, ops) = app.seed_operator();
    app.outbox.fail.store(true, Ordering::SeqCst);

    let created = app.submit(&token, "info", "Anyone there?").await;
    let id = created["id"].as_i64().unwrap();

    let (status, answered) = app
        .call(
            "POST",
            &format!("/admin/requests/{}/answer", id),
            Some(&ops),
            Some(json!({ "answer": "Yes" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answered["status"], "answered");

    let (_, list) = app.call("GET", "/requests", Some(&token), None).await;
    assert_eq!(list[0]["status"], "answered");
    assert!(app.outbox.emails().is_empty());
}

#[tokio::test]
async fn test_admin_request_listing() {
    let app = spawn_app();
    let (jo_id, jo) = app.seed_user("jo@example.com", "Jo");
    let (_, ops) = app.seed_operator();

    let info = app.submit(&jo, "info", "Question").await["id"].as_i64().unwrap();
    let site = app.submit(&jo, "frontend", "Need a site").await["id"].as_i64().unwrap();
    app.call(
        "POST",
        &format!("/admin/requests/{}/answer", info),
        Some(&ops),
        Some(json!({ "answer": "Answer" })),
    )
    .await;

    let (status, body) = app.call("GET", "/admin/requests", Some(&ops), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending_count"], 1);
    let requests = body["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["id"].as_i64(), Some(site));
    assert_eq!(requests[0]["profile"]["email"], "jo@example.com");
    assert_eq!(requests[0]["profile"]["full_name"], "Jo");
    assert_eq!(requests[0]["profile"]["id"], jo_id.to_string());

    let (_, body) = app
        .call("GET", "/admin/requests?status=answered", Some(&ops), None)
        .await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["requests"][0]["id"].as_i64(), Some(info));

    let (_, body) = app
        .call("GET", "/admin/requests?plan=frontend", Some(&ops), None)
        .await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["requests"][0]["plan"], "frontend");

    let (status, _) = app
        .call("GET", "/admin/requests?plan=enterprise", Some(&ops), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_users() {
    let app = spawn_app();
    let (_, ops) = app.seed_user_at(OPERATOR_EMAIL, "Ada Operator", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let (zed_id, zed) = app.seed_user_at("zed@example.com", "Zed", Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap());
    app.seed_user_at("bo@example.com", "Bo", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());

    let (status, users) = app.call("GET", "/admin/users", Some(&ops), None).await;
    assert_eq!(status, StatusCode::OK);
    let emails: Vec<&str> = users
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, vec!["zed@example.com", "bo@example.com", OPERATOR_EMAIL]);
    assert!(users[0].get("password").is_none());

    let (_, users) = app.call("GET", "/admin/users?sort=name", Some(&ops), None).await;
    assert_eq!(users[0]["full_name"], "Ada Operator");
    assert_eq!(users[1]["full_name"], "Bo");

    let (_, users) = app.call("GET", "/admin/users?search=ZE", Some(&ops), None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);

    let (status, stats) = app.call("GET", "/admin/stats", Some(&ops), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_users"], 3);
    assert_eq!(stats["signups_by_date"]["2024-01-02"], 1);
    assert_eq!(stats["last_signups"][0]["email"], "zed@example.com");

    // Deleting a user removes their requests too
    app.submit(&zed, "info", "Bye").await;
    let (status, body) = app
        .call("DELETE", "/admin/users", Some(&ops), Some(json!({ "userId": zed_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = app.call("GET", "/admin/requests", Some(&ops), None).await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 0);

    let (status, _) = app
        .call("DELETE", "/admin/users", Some(&ops), Some(json!({ "user_id": zed_id })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operator_cannot_delete_self() {
    let app = spawn_app();
    let (ops_id, ops) = app.seed_operator();

    let (status, _) = app
        .call("DELETE", "/admin/users", Some(&ops), Some(json!({ "user_id": ops_id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_notification_functions() {
    let app = spawn_app();
    let (_, user) = app.seed_user("jo@example.com", "Jo");
    let (_, ops) = app.seed_operator();

    let (status, body) = app
        .call(
            "POST",
            "/functions/send-admin-notification",
            Some(&user),
            Some(json!({
                "userEmail": "jo@example.com",
                "userName": "Jo",
                "plan": "fullstack",
                "text": "Need an app"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let emails = app.outbox.emails();
    assert_eq!(emails[0].to, OPERATOR_EMAIL);
    assert!(emails[0].content.contains("Plan: Web App"));

    let (status, body) = app
        .call(
            "POST",
            "/functions/send-admin-notification",
            Some(&user),
            Some(json!({ "userEmail": "jo@example.com", "plan": "info", "text": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let answer = json!({ "userEmail": "jo@example.com", "answer": "Sure" });
    let (status, _) = app
        .call("POST", "/functions/send-user-notification", Some(&user), Some(answer.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("POST", "/functions/send-user-notification", Some(&ops), Some(answer.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(app.outbox.emails()[1].to, "jo@example.com");

    app.outbox.fail.store(true, Ordering::SeqCst);
    let (status, body) = app
        .call("POST", "/functions/send-user-notification", Some(&ops), Some(answer))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("notification failed"));

    let (status, body) = app
        .call(
            "POST",
            "/functions/send-admin-notification",
            Some(&user),
            Some(json!({ "userEmail": "jo@example.com", "plan": "info", "text": "Hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email API returned 503"));
    assert_eq!(app.outbox.emails().len(), 2);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = spawn_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/functions/send-admin-notification")
                .header("Origin", "https://portfolio.example.com")
                .header("Access-Control-Request-Method", "POST")
                .header("Access-Control-Request-Headers", "authorization, content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

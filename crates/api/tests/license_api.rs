//! Integration tests for license issuance, activation, verification, and
//! the admin surface.

mod common;

use axum::http::StatusCode;
use common::{admin_token, body_json, build_test_app, get, post_json, signup};
use serde_json::json;

/// Admin generates a license and returns its key.
async fn generate_license(app: &common::TestApp, token: &str) -> String {
    let response = post_json(app, "/api/v1/admin/licenses", json!({}), Some(token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let license = body_json(response).await;
    assert_eq!(license["status"], "unused");
    license["key"].as_str().expect("key field").to_string()
}

#[tokio::test]
async fn issue_activate_verify_lifecycle() {
    let app = build_test_app().await;
    let admin = admin_token(&app).await;
    let key = generate_license(&app, &admin).await;

    let user = signup(&app, "Ana", "ana@example.com", "a-strong-password").await;

    // Activate.
    let response = post_json(
        &app,
        "/api/v1/license/activate",
        json!({ "license_key": key }),
        Some(&user),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let activated = body_json(response).await;
    assert_eq!(activated["success"], true);
    assert!(activated["expires_at"].is_string());

    // The summary reflects the activation.
    let response = get(&app, "/api/v1/license/summary", Some(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["key"], key.as_str());
    assert_eq!(summary["status"], "active");

    // Machine-bound verify (public endpoint).
    let response = post_json(
        &app,
        "/api/v1/license/verify",
        json!({ "license_key": key, "machine_id": "machine-1" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let verified = body_json(response).await;
    assert_eq!(verified["valid"], true);
    assert_eq!(verified["offline"], false);
    assert_eq!(verified["user"]["email"], "ana@example.com");

    // A different machine is refused.
    let response = post_json(
        &app,
        "/api/v1/license/verify",
        json!({ "license_key": key, "machine_id": "machine-2" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn second_activation_conflicts() {
    let app = build_test_app().await;
    let admin = admin_token(&app).await;
    let key = generate_license(&app, &admin).await;

    let first = signup(&app, "Ana", "ana@example.com", "a-strong-password").await;
    let second = signup(&app, "Bo", "bo@example.com", "a-strong-password").await;

    let response = post_json(
        &app,
        "/api/v1/license/activate",
        json!({ "license_key": key }),
        Some(&first),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &app,
        "/api/v1/license/activate",
        json!({ "license_key": key }),
        Some(&second),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "LICENSE_ALREADY_USED");
}

#[tokio::test]
async fn activating_an_unknown_key_is_not_found() {
    let app = build_test_app().await;
    let user = signup(&app, "Ana", "ana@example.com", "a-strong-password").await;

    let response = post_json(
        &app,
        "/api/v1/license/activate",
        json!({ "license_key": "BL-ZZZZ-ZZZZ-ZZZZ-ZZZZ" }),
        Some(&user),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_surface_requires_the_admin_flag() {
    let app = build_test_app().await;
    let user = signup(&app, "Ana", "ana@example.com", "a-strong-password").await;

    let response = get(&app, "/api/v1/admin/stats", Some(&user)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = post_json(&app, "/api/v1/admin/licenses", json!({}), Some(&user)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_stats_track_license_states() {
    let app = build_test_app().await;
    let admin = admin_token(&app).await;
    let key = generate_license(&app, &admin).await;
    generate_license(&app, &admin).await;

    let user = signup(&app, "Ana", "ana@example.com", "a-strong-password").await;
    post_json(
        &app,
        "/api/v1/license/activate",
        json!({ "license_key": key }),
        Some(&user),
    )
    .await;

    let response = get(&app, "/api/v1/admin/stats", Some(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_users"], 1);
    assert_eq!(stats["active_licenses"], 1);
    assert_eq!(stats["unused_licenses"], 1);
    assert_eq!(stats["expired_licenses"], 0);
}

#[tokio::test]
async fn payment_settings_are_public() {
    let app = build_test_app().await;
    let response = get(&app, "/api/v1/public/payment-settings", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let settings = body_json(response).await;
    assert_eq!(settings["license_price"], "999");
}

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};
use switchboard_server::{app, AppState};
use switchboard_voice::{LiveKitConfig, VoiceService};
use tower::ServiceExt;

fn setup_app() -> Router {
    let pool = create_pool(
        ":memory:",
        DbRuntimeSettings {
            pool_max_size: 1,
            ..Default::default()
        },
    )
    .unwrap();
    {
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
    }
    let voice = Arc::new(VoiceService::new(LiveKitConfig::new(
        "http://127.0.0.1:9",
        "test-key",
        "test-secret",
    )));
    app(AppState { pool, voice })
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("Authorization", format!("Bearer {key}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn issue_key(app: &Router, email: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/auth/create-key",
        None,
        Some(json!({"user_name": "Test User", "user_email": email})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["api_key"].as_str().unwrap().to_string()
}

async fn create_assistant(app: &Router, key: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/assistant/create",
        Some(key),
        Some(json!({
            "name": "Support",
            "prompt": "Be helpful.",
            "tts_provider": "cartesia",
            "voice_id": "voice-1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["assistant_id"].as_str().unwrap().to_string()
}

async fn create_tool(app: &Router, key: &str, name: &str) -> String {
    let (status, body) = request(
        app,
        "POST",
        "/tool/create",
        Some(key),
        Some(json!({
            "tool_name": name,
            "tool_description": "Returns store opening hours",
            "parameters": [
                {"name": "city", "type": "string", "description": "City name", "required": true}
            ],
            "execution_type": "static_return",
            "execution_config": {"value": {"open": "09:00", "close": "18:00"}}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "tool create failed: {body}");
    body["data"]["tool_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_update_and_delete_round_trip() {
    let app = setup_app();
    let key = issue_key(&app, "ops@acme.test").await;

    let (status, body) = request(
        &app,
        "POST",
        "/tool/create",
        Some(&key),
        Some(json!({
            "tool_name": "check_inventory",
            "tool_description": "Checks warehouse stock",
            "parameters": [{"name": "sku", "type": "string", "required": true}],
            "execution_type": "webhook",
            "execution_config": {"url": "https://hooks.acme.test/inventory", "timeout_secs": 10}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tool created successfully");
    assert_eq!(body["data"]["tool_name"], "check_inventory");
    assert_eq!(body["data"]["execution_type"], "webhook");
    assert_eq!(body["data"]["parameters"][0]["name"], "sku");
    assert!(body["data"].get("id").is_none());
    let tool_id = body["data"]["tool_id"].as_str().unwrap().to_string();

    // Partial update keeps the rest of the record.
    let (status, body) = request(
        &app,
        "PATCH",
        &format!("/tool/update/{tool_id}"),
        Some(&key),
        Some(json!({"tool_description": "Checks stock across all warehouses"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tool updated successfully");
    assert_eq!(body["data"]["tool_description"], "Checks stock across all warehouses");
    assert_eq!(body["data"]["tool_name"], "check_inventory");

    let (status, body) = request(
        &app,
        "DELETE",
        &format!("/tool/delete/{tool_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tool deleted successfully");
    assert_eq!(body["data"]["detached_from_assistants"], 0);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/tool/details/{tool_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tool not found");
}

#[tokio::test]
async fn create_rejects_bad_definitions() {
    let app = setup_app();
    let key = issue_key(&app, "ops@acme.test").await;

    let cases: Vec<(Value, &str)> = vec![
        (
            json!({"tool_name": "Check-Inventory", "tool_description": "d",
                   "execution_type": "webhook", "execution_config": {"url": "https://x.test"}}),
            "tool_name must match ^[a-z_][a-z0-9_]*$",
        ),
        (
            json!({"tool_name": "check", "tool_description": "d",
                   "execution_type": "grpc", "execution_config": {}}),
            "execution_type must be 'webhook' or 'static_return'",
        ),
        (
            json!({"tool_name": "check", "tool_description": "d",
                   "execution_type": "webhook", "execution_config": {}}),
            "webhook execution_config requires a url",
        ),
        (
            json!({"tool_name": "check", "tool_description": "d",
                   "execution_type": "static_return", "execution_config": {}}),
            "static_return execution_config requires a value",
        ),
        (
            json!({"tool_name": "check", "tool_description": "d",
                   "parameters": [{"name": "a", "type": "string"}, {"name": "a", "type": "number"}],
                   "execution_type": "static_return", "execution_config": {"value": 1}}),
            "duplicate parameter name: a",
        ),
    ];

    for (payload, expected) in cases {
        let (status, body) = request(&app, "POST", "/tool/create", Some(&key), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "expected 400 for {expected}");
        assert_eq!(body["message"], expected);
    }
}

#[tokio::test]
async fn update_validates_merged_execution_settings() {
    let app = setup_app();
    let key = issue_key(&app, "ops@acme.test").await;
    let tool_id = create_tool(&app, &key, "store_hours").await;

    // Switching a static tool to webhook without a url must fail: the stored
    // config has no url to fall back on.
    let (status, body) = request(
        &app,
        "PATCH",
        &format!("/tool/update/{tool_id}"),
        Some(&key),
        Some(json!({"execution_type": "webhook"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "webhook execution_config requires a url");

    // Supplying both switches cleanly.
    let (status, body) = request(
        &app,
        "PATCH",
        &format!("/tool/update/{tool_id}"),
        Some(&key),
        Some(json!({
            "execution_type": "webhook",
            "execution_config": {"url": "https://hooks.acme.test/hours"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["execution_type"], "webhook");
    assert_eq!(body["data"]["execution_config"]["url"], "https://hooks.acme.test/hours");
}

#[tokio::test]
async fn attach_detach_and_delete_sweep() {
    let app = setup_app();
    let key = issue_key(&app, "ops@acme.test").await;
    let assistant_id = create_assistant(&app, &key).await;
    let hours = create_tool(&app, &key, "store_hours").await;
    let stock = create_tool(&app, &key, "check_stock").await;

    // Batch with an unknown ID attaches nothing.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/attach/{assistant_id}"),
        Some(&key),
        Some(json!({"tool_ids": [hours, "ghost"]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tools not found: ghost");

    let (_, body) = request(
        &app,
        "GET",
        &format!("/assistant/details/{assistant_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(body["data"]["tool_ids"], json!([]));

    // Valid batch attaches as a union.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/attach/{assistant_id}"),
        Some(&key),
        Some(json!({"tool_ids": [hours, stock]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tools attached successfully");
    assert_eq!(body["data"]["tool_ids"], json!([hours, stock]));

    // Empty batches are rejected outright.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/detach/{assistant_id}"),
        Some(&key),
        Some(json!({"tool_ids": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "tool_ids must be a non-empty list");

    // Detaching an unattached ID is a no-op.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/detach/{assistant_id}"),
        Some(&key),
        Some(json!({"tool_ids": ["never-attached"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tools detached successfully");
    assert_eq!(body["data"]["tool_ids"], json!([hours, stock]));

    // Deleting an attached tool sweeps it out of the assistant.
    let (status, body) = request(
        &app,
        "DELETE",
        &format!("/tool/delete/{hours}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["detached_from_assistants"], 1);

    let (_, body) = request(
        &app,
        "GET",
        &format!("/assistant/details/{assistant_id}"),
        Some(&key),
        None,
    )
    .await;
    assert_eq!(body["data"]["tool_ids"], json!([stock]));
}

#[tokio::test]
async fn attachments_are_owner_scoped() {
    let app = setup_app();
    let ours = issue_key(&app, "ours@acme.test").await;
    let theirs = issue_key(&app, "theirs@acme.test").await;
    let assistant_id = create_assistant(&app, &ours).await;
    let their_tool = create_tool(&app, &theirs, "their_tool").await;

    // Attaching to someone else's assistant looks like a missing assistant.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/attach/{assistant_id}"),
        Some(&theirs),
        Some(json!({"tool_ids": [their_tool]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Assistant not found");

    // Attaching someone else's tool to our assistant looks like a missing tool.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/tool/attach/{assistant_id}"),
        Some(&ours),
        Some(json!({"tool_ids": [their_tool]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        format!("Tools not found: {their_tool}")
    );
}

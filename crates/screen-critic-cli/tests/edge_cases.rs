//! Edge case integration tests for screen-critic-cli.
//!
//! Drives `run_once` with resolved settings against mocked hosted services.

use std::collections::HashMap;
use std::path::Path;

use base64::Engine;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use screen_critic::{CritiqueError, Service, Tone};
use screen_critic_cli::config::*;
use screen_critic_cli::{build_pipeline, run_once, Overrides, Settings};

// ─────────────────────── helpers ───────────────────────

/// Resolve settings for an assets dir, pointing both services at `server`.
fn settings_for(assets: &Path, server: &MockServer, extra: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = HashMap::from([
        (ENV_ASSETS_DIR.to_string(), assets.display().to_string()),
        (ENV_REPLICATE_TOKEN.to_string(), "r8_integration".to_string()),
        (ENV_OPENAI_KEY.to_string(), "sk-integration".to_string()),
        (ENV_REPLICATE_URL.to_string(), server.uri()),
        (ENV_OPENAI_URL.to_string(), server.uri()),
        (ENV_TIMEOUT_SECS.to_string(), "10".to_string()),
    ]);
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }
    Settings::resolve_with(&Overrides::default(), |key: &str| vars.get(key).cloned()).unwrap()
}

/// Lay out an engine assets directory with a screenshot and a Python/ folder.
fn engine_assets() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("Python")).unwrap();
    image::DynamicImage::new_rgb8(16, 9)
        .save(dir.path().join(DEFAULT_IMAGE_NAME))
        .unwrap();
    dir
}

async fn mount_caption(server: &MockServer, caption: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "it",
            "status": "succeeded",
            "output": caption
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_review(server: &MockServer, review: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": review } }]
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_default_engine_layout() {
    let server = MockServer::start().await;
    mount_caption(&server, "a knight in a neon forest", 1).await;
    mount_review(&server, "The neon drowns the knight.", 1).await;
    let assets = engine_assets();

    let report = run_once(&settings_for(assets.path(), &server, &[]))
        .await
        .unwrap();

    let written = std::fs::read_to_string(assets.path().join(DEFAULT_OUTPUT_NAME)).unwrap();
    assert_eq!(written, "The neon drowns the knight.");
    assert_eq!(report.caption.as_str(), "a knight in a neon forest");
}

#[tokio::test]
async fn test_tone_from_env_reaches_prompt() {
    let server = MockServer::start().await;
    mount_caption(&server, "a sunflower field", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("in an appreciative tone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "Radiant." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let assets = engine_assets();

    let settings = settings_for(assets.path(), &server, &[(ENV_TONE, "positive")]);
    assert_eq!(settings.tone, Tone::Positive);
    run_once(&settings).await.unwrap();
}

#[tokio::test]
async fn test_missing_credentials_fail_before_network() {
    let server = MockServer::start().await;
    mount_caption(&server, "unused", 0).await;
    mount_review(&server, "unused", 0).await;
    let assets = engine_assets();

    let mut settings = settings_for(assets.path(), &server, &[]);
    settings.openai_key = None;

    let err = run_once(&settings).await.unwrap_err();
    assert!(matches!(
        err,
        CritiqueError::Auth {
            service: Service::Generator,
            ..
        }
    ));
    assert_eq!(err.exit_code(), 4);

    settings.replicate_token = None;
    assert!(matches!(
        build_pipeline(&settings).err().unwrap(),
        CritiqueError::Auth {
            service: Service::Captioner,
            ..
        }
    ));
}

#[tokio::test]
async fn test_missing_output_dir_fails_before_network() {
    let server = MockServer::start().await;
    mount_caption(&server, "unused", 0).await;
    mount_review(&server, "unused", 0).await;
    let assets = tempfile::tempdir().unwrap();
    image::DynamicImage::new_rgb8(4, 4)
        .save(assets.path().join(DEFAULT_IMAGE_NAME))
        .unwrap();
    // No Python/ directory, so the default output location is unwritable.

    let err = run_once(&settings_for(assets.path(), &server, &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, CritiqueError::Io(_)));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_generator_outage_keeps_previous_review() {
    let server = MockServer::start().await;
    mount_caption(&server, "a harbor at noon", 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    let assets = engine_assets();
    let output = assets.path().join(DEFAULT_OUTPUT_NAME);
    std::fs::write(&output, "last run's review").unwrap();

    let err = run_once(&settings_for(assets.path(), &server, &[]))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "last run's review");
}

#[tokio::test]
async fn test_missing_screenshot_skips_generator() {
    let server = MockServer::start().await;
    mount_caption(&server, "unused", 0).await;
    mount_review(&server, "unused", 0).await;
    let assets = tempfile::tempdir().unwrap();
    std::fs::create_dir(assets.path().join("Python")).unwrap();

    let err = run_once(&settings_for(assets.path(), &server, &[]))
        .await
        .unwrap_err();

    assert_eq!(err.service(), Some(Service::Captioner));
    assert!(!assets.path().join(DEFAULT_OUTPUT_NAME).exists());
}

#[tokio::test]
async fn test_downscale_setting_applies() {
    let server = MockServer::start().await;
    mount_caption(&server, "a tiny room", 1).await;
    mount_review(&server, "Cramped.", 1).await;
    let assets = engine_assets();

    let settings = settings_for(assets.path(), &server, &[(ENV_MAX_IMAGE_DIM, "8")]);
    assert_eq!(settings.max_image_dim, Some(8));
    run_once(&settings).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let prediction = requests
        .iter()
        .find(|r| r.url.path() == "/v1/predictions")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&prediction.body).unwrap();
    let uri = body["input"]["image"].as_str().unwrap();
    let encoded = uri.strip_prefix("data:image/png;base64,").unwrap();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    let sent = image::load_from_memory(&bytes).unwrap();
    // The 16x9 fixture must arrive shrunk to fit 8x8.
    assert!(sent.width() <= 8 && sent.height() <= 8, "{}x{}", sent.width(), sent.height());
    assert!(sent.width() < 16);
}

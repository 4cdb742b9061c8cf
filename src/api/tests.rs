use std::sync::Arc;

use serde_json::{json, Value};

use super::{router, AppState};
use crate::manifest::{self, Manifest, ProviderConfig, ProviderType};
use crate::probe::StaticProbe;
use crate::service::AgentVaultService;
use crate::vault::MemorySecretStore;

const TOKEN: &str = "test-token";

struct TestApp {
    base: String,
    client: reqwest::Client,
    secrets: Arc<MemorySecretStore>,
    _temp: tempfile::TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

fn sample_manifest() -> Manifest {
    Manifest::new("2026.1")
        .with_provider(
            "openai_pro",
            ProviderConfig::new(ProviderType::Upstream)
                .with_vault_key("openai/api_key")
                .with_env_var("OPENAI_API_KEY")
                .with_priority(1),
        )
        .with_provider(
            "local_ollama",
            ProviderConfig::new(ProviderType::Local)
                .with_endpoint("http://localhost:11434")
                .with_priority(10),
        )
}

async fn spawn_app() -> TestApp {
    let temp = tempfile::tempdir().expect("tempdir");
    let manifest_path = temp.path().join("manifest.json");
    manifest::store::save(&manifest_path, &sample_manifest()).unwrap();

    let secrets = Arc::new(MemorySecretStore::new("agent_vault"));
    let probe = StaticProbe::new().with("http://localhost:11434", true);
    let service = AgentVaultService::new(manifest_path, secrets.clone(), Arc::new(probe));
    let state = Arc::new(AppState::new(service, TOKEN));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: reqwest::Client::new(),
        secrets,
        _temp: temp,
    }
}

#[tokio::test]
async fn health_reports_version() {
    let app = spawn_app().await;
    let body: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn dashboard_page_carries_token() {
    let app = spawn_app().await;
    let resp = app.client.get(app.url("/")).send().await.unwrap();

    assert_eq!(resp.status(), 200);
    let page = resp.text().await.unwrap();
    assert!(page.contains(&format!("\"{}\"", TOKEN)));
}

#[tokio::test]
async fn providers_are_ranked_with_tristate_status() {
    let app = spawn_app().await;
    let body: Value = app
        .client
        .get(app.url("/providers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let providers = body["providers"].as_array().unwrap();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0]["name"], "openai_pro");
    assert_eq!(providers[0]["type"], "upstream");
    assert_eq!(providers[0]["has_secret"], "absent");
    assert_eq!(providers[0]["endpoint_reachable"], "not_applicable");
    assert_eq!(providers[1]["name"], "local_ollama");
    assert_eq!(providers[1]["has_secret"], "not_applicable");
    assert_eq!(providers[1]["endpoint_reachable"], "reachable");
}

#[tokio::test]
async fn secret_writes_require_token() {
    let app = spawn_app().await;
    let url = app.url("/providers/openai_pro/secret");

    let resp = app
        .client
        .post(&url)
        .json(&json!({"secret": "sk-live"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Unauthorized");

    let resp = app
        .client
        .post(&url)
        .header("X-Agent-Vault-Token", "wrong-token")
        .json(&json!({"secret": "sk-live"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app.client.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    assert!(app.secrets.stored_value("openai/api_key").is_none());
}

#[tokio::test]
async fn secret_lifecycle_over_http() {
    let app = spawn_app().await;
    let url = app.url("/providers/openai_pro/secret");

    let resp = app
        .client
        .post(&url)
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"secret": "sk-live"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "stored");
    assert_eq!(
        app.secrets.stored_value("openai/api_key").as_deref(),
        Some("sk-live")
    );

    let body: Value = app
        .client
        .post(app.url("/providers/openai_pro/test"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["has_secret"], "present");
    assert_eq!(body["failures"], json!([]));

    let resp = app.client.delete(&url).bearer_auth(TOKEN).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted"], true);

    let body: Value = app
        .client
        .delete(&url)
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["deleted"], false);
}

#[tokio::test]
async fn invalid_secret_requests_are_client_errors() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/providers/openai_pro/secret"))
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"secret": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Secret cannot be empty");

    let resp = app
        .client
        .post(app.url("/providers/ghost/secret"))
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"secret": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Provider not found: ghost");

    let resp = app
        .client
        .post(app.url("/providers/local_ollama/secret"))
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"secret": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_endpoint_lists_failures() {
    let app = spawn_app().await;
    let body: Value = app
        .client
        .post(app.url("/providers/openai_pro/test"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["provider"], "openai_pro");
    assert_eq!(body["ok"], false);
    assert_eq!(body["failures"], json!(["missing secret"]));

    let resp = app
        .client
        .post(app.url("/providers/ghost/test"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn backend_failures_are_server_errors() {
    let app = spawn_app().await;
    app.secrets.fail_with("keychain locked");

    let resp = app.client.get(app.url("/providers")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("keychain locked"));

    let resp = app
        .client
        .post(app.url("/providers/openai_pro/secret"))
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"secret": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
}

#[tokio::test]
async fn manifest_round_trips_through_api() {
    let app = spawn_app().await;

    let body: Value = app
        .client
        .get(app.url("/manifest"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["manifest"]["version"], "2026.1");
    assert_eq!(body["manifest"]["providers"]["openai_pro"]["priority"], 1);

    let mut updated = body["manifest"].clone();
    updated["providers"]["openrouter"] = json!({
        "type": "gateway",
        "vault_key": "openrouter/api_key",
        "priority": 0
    });

    let resp = app
        .client
        .put(app.url("/manifest"))
        .json(&json!({"manifest": updated}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = app
        .client
        .put(app.url("/manifest"))
        .header("X-Agent-Vault-Token", TOKEN)
        .json(&json!({"manifest": updated}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "updated");

    let body: Value = app
        .client
        .get(app.url("/providers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["providers"][0]["name"], "openrouter");
}

#[tokio::test]
async fn invalid_manifest_is_rejected_and_not_saved() {
    let app = spawn_app().await;

    for manifest in [
        json!({"version": "", "providers": {}}),
        json!({"version": "1", "providers": {"x": {"type": "mainframe"}}}),
        json!({"providers": {}}),
    ] {
        let resp = app
            .client
            .put(app.url("/manifest"))
            .header("X-Agent-Vault-Token", TOKEN)
            .json(&json!({ "manifest": manifest }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].is_string());
    }

    let body: Value = app
        .client
        .get(app.url("/manifest"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["manifest"]["version"], "2026.1");
}

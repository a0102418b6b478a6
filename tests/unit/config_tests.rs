//! Unit tests for configuration parsing, defaults, and validation.

use rwx_bridge::config::{AccessToken, CachePolicy};
use rwx_bridge::{AppError, GlobalConfig};

#[test]
fn minimal_config_gets_full_defaults() {
    let config = GlobalConfig::from_toml_str("org = \"curri\"").expect("minimal config parses");

    assert_eq!(config.org, "curri");
    assert_eq!(config.workflow_path, ".rwx/ci.yml");
    assert_eq!(config.cloud_base_url, "https://cloud.rwx.com/mint/api");
    assert_eq!(config.proxy.command, "rwx");
    assert_eq!(config.proxy.args, vec!["mcp".to_owned(), "serve".to_owned()]);
    assert!(!config.proxy.rewrite_references);
    assert_eq!(config.log_cache.ttl_seconds, 1800);
    assert_eq!(config.log_cache.policy, CachePolicy::CompletedRunsOnly);
    assert_eq!(config.honeycomb.dataset, "rwx");
    assert_eq!(config.honeycomb.environment, "test");
}

#[test]
fn full_config_overrides_every_default() {
    let raw = r#"
        org = "acme"
        workflow_path = "ci/pipeline.yml"
        cloud_base_url = "https://cloud.example.com/api"

        [proxy]
        command = "node"
        args = ["dist/index.js"]
        rewrite_references = true

        [log_cache]
        ttl_seconds = 60
        policy = "always"

        [honeycomb]
        dataset = "builds"
        environment = "prod"
    "#;

    let config = GlobalConfig::from_toml_str(raw).expect("full config parses");
    assert_eq!(config.org, "acme");
    assert_eq!(config.workflow_path, "ci/pipeline.yml");
    assert_eq!(config.proxy.command, "node");
    assert!(config.proxy.rewrite_references);
    assert_eq!(config.log_cache.policy, CachePolicy::Always);
    assert_eq!(config.log_cache.ttl_seconds, 60);
    assert_eq!(config.honeycomb.dataset, "builds");
}

#[test]
fn empty_org_is_rejected() {
    let err = GlobalConfig::from_toml_str("org = \"  \"").expect_err("must fail validation");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn empty_proxy_command_is_rejected() {
    let raw = "org = \"curri\"\n[proxy]\ncommand = \"\"";
    let err = GlobalConfig::from_toml_str(raw).expect_err("must fail validation");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_ttl_with_caching_enabled_is_rejected() {
    let raw = "org = \"curri\"\n[log_cache]\nttl_seconds = 0";
    let err = GlobalConfig::from_toml_str(raw).expect_err("must fail validation");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn zero_ttl_is_fine_when_caching_is_off() {
    let raw = "org = \"curri\"\n[log_cache]\nttl_seconds = 0\npolicy = \"never\"";
    let config = GlobalConfig::from_toml_str(raw).expect("parses");
    assert_eq!(config.log_cache.policy, CachePolicy::Never);
}

#[test]
fn garbage_toml_maps_to_config_error() {
    let err = GlobalConfig::from_toml_str("org = [not toml").expect_err("must fail parse");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn run_url_embeds_org_and_id() {
    let config = GlobalConfig::from_toml_str("org = \"curri\"").expect("parses");
    assert_eq!(
        config.run_url("abc123"),
        "https://cloud.rwx.com/mint/curri/runs/abc123"
    );
}

#[tokio::test]
async fn access_token_slot_round_trips() {
    let token = AccessToken::new();
    assert!(!token.is_set().await);
    assert_eq!(token.get().await, None);

    token.set("tok-1").await;
    assert!(token.is_set().await);
    assert_eq!(token.get().await.as_deref(), Some("tok-1"));

    // Clones share the slot — the setter tool and the cloud client see the
    // same state.
    let clone = token.clone();
    clone.set("tok-2").await;
    assert_eq!(token.get().await.as_deref(), Some("tok-2"));
}

//! Secrets stay out of the config tree.
//!
//! - Literal token values are refused with CONFIG_SECRET_DETECTED.
//! - Env var names load fine and resolve at startup.
//! - Missing required variables fail with the variable NAME.
//! - `Debug` of resolved secrets is redacted.
//!
//! Failure tests use sentinel variable names that are never set, so no test
//! mutates the process environment.

use sw_config::{load_layered_yaml_from_strings, resolve_secrets, SecretNeeds, StoreKind};

fn yaml(extra: &str) -> String {
    format!(
        r#"
twitch:
  game_ids: ["6086"]
agents:
  - channel: "100"
icons: ["a.png", "b.png", "c.png"]
{extra}
"#
    )
}

#[test]
fn literal_discord_token_is_rejected() {
    let doc = yaml("discord:\n  token_env: \"Bot MTAxMjM0NTY3ODkw.secret\"\n");
    let err = load_layered_yaml_from_strings(&[&doc]).unwrap_err().to_string();
    assert!(err.contains("CONFIG_SECRET_DETECTED"), "{err}");
    assert!(err.contains("/discord/token_env"), "{err}");
    assert!(!err.contains("MTAxMjM0NTY3ODkw"), "value must be redacted: {err}");
}

#[test]
fn secret_inside_array_is_rejected() {
    let doc = yaml("");
    let bad = "twitch:\n  game_ids: [\"ghp_abcdefghijklmnop\"]\n";
    let err = load_layered_yaml_from_strings(&[&doc, bad])
        .unwrap_err()
        .to_string();
    assert!(err.contains("/twitch/game_ids/0"), "{err}");
}

#[test]
fn missing_discord_token_names_the_variable() {
    let doc = yaml("discord:\n  token_env: SW_TEST_SENTINEL_DISCORD_UNSET_7Q\n");
    let cfg = load_layered_yaml_from_strings(&[&doc])
        .unwrap()
        .typed()
        .unwrap();
    let err = resolve_secrets(&cfg, SecretNeeds::ALL).unwrap_err().to_string();
    assert!(err.contains("SECRETS_MISSING"), "{err}");
    assert!(err.contains("SW_TEST_SENTINEL_DISCORD_UNSET_7Q"), "{err}");
}

#[test]
fn missing_twitch_credentials_name_the_variable() {
    let doc = yaml(
        "store: memory\ntwitch:\n  client_id_env: SW_TEST_SENTINEL_TWITCH_ID_UNSET_7Q\n",
    );
    let cfg = load_layered_yaml_from_strings(&[&doc])
        .unwrap()
        .typed()
        .unwrap();
    assert_eq!(cfg.store, StoreKind::Memory);
    let err = resolve_secrets(&cfg, SecretNeeds::ALL).unwrap_err().to_string();
    assert!(err.contains("SW_TEST_SENTINEL_TWITCH_ID_UNSET_7Q"), "{err}");
}

#[test]
fn memory_store_needs_no_discord_token() {
    let doc = yaml("store: memory\ndiscord:\n  token_env: SW_TEST_SENTINEL_DISCORD_UNSET_8R\n");
    let cfg = load_layered_yaml_from_strings(&[&doc])
        .unwrap()
        .typed()
        .unwrap();
    let needs = SecretNeeds {
        store: true,
        feed: false,
    };
    let secrets = resolve_secrets(&cfg, needs).unwrap();
    assert!(secrets.discord_token.is_none());
}

#[test]
fn debug_output_is_redacted() {
    let secrets = sw_config::ResolvedSecrets {
        discord_token: Some("super-secret-token".to_string()),
        twitch_client_id: Some("client-id-value".to_string()),
        twitch_client_secret: None,
    };
    let dbg = format!("{secrets:?}");
    assert!(!dbg.contains("super-secret-token"));
    assert!(!dbg.contains("client-id-value"));
    assert!(dbg.contains("<REDACTED>"));
}

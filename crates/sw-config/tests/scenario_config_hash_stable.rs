//! Config hash stability.
//!
//! - Same inputs hash identically across calls.
//! - Key order inside a document does not affect the hash.
//! - An overlay that changes a value changes the hash.

use sw_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
twitch:
  game_ids: ["6086"]
  poll_interval_secs: 60
agents:
  - channel: "100"
  - channel: "200"
    filtered: true
icons: ["https://i.example/0.png", "https://i.example/1.png", "https://i.example/2.png"]
"#;

const BASE_YAML_REORDERED: &str = r#"
icons: ["https://i.example/0.png", "https://i.example/1.png", "https://i.example/2.png"]
agents:
  - channel: "100"
  - filtered: true
    channel: "200"
twitch:
  poll_interval_secs: 60
  game_ids: ["6086"]
"#;

const OVERLAY_YAML: &str = r#"
twitch:
  poll_interval_secs: 30
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash.len(), 64, "sha-256 hex digest");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(original.config_hash, reordered.config_hash);
}

#[test]
fn overlay_changes_hash_and_wins() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.typed().unwrap();
    assert_eq!(cfg.twitch.poll_interval_secs, 30);
    assert_eq!(cfg.twitch.game_ids, vec!["6086".to_string()]);
}

#[test]
fn layering_order_matters() {
    let ab = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let ba = load_layered_yaml_from_strings(&[OVERLAY_YAML, BASE_YAML]).unwrap();
    assert_ne!(ab.config_hash, ba.config_hash);
}

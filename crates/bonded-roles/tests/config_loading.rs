//! Loading registry configuration from files

use bonded_core::{BondAmount, RoleType};
use bonded_roles::RegistryConfig;
use std::io::Write;
use std::time::Duration;

fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn toml_file_overrides_defaults() {
    let file = write_config(
        ".toml",
        r#"
grace_window_ms = 60000
purge_on_revoke = true
min_confirmations = 3

[min_bonds]
mediator = 2500
security-manager = 9000
"#,
    );

    let config = RegistryConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.grace_window(), Duration::from_secs(60));
    assert!(config.purge_on_revoke);
    assert_eq!(config.min_confirmations, 3);
    // untouched fields keep their defaults
    assert_eq!(
        config.evidence_timeout_ms,
        RegistryConfig::default().evidence_timeout_ms
    );

    assert_eq!(config.min_bond(RoleType::Mediator), Some(BondAmount::new(2_500)));
    assert_eq!(
        config.min_bond(RoleType::SecurityManager),
        Some(BondAmount::new(9_000))
    );
    // a bond table replaces the default table
    assert_eq!(config.min_bond(RoleType::SeedNode), None);
    config.validate().unwrap();
}

#[test]
fn json_file_is_recognized_by_extension() {
    let file = write_config(
        ".json",
        r#"{ "evidence_timeout_ms": 750, "min_bonds": { "SEED_NODE": 10 } }"#,
    );

    let config = RegistryConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.evidence_timeout(), Duration::from_millis(750));
    assert_eq!(config.min_bond(RoleType::SeedNode), Some(BondAmount::new(10)));
}

#[test]
fn invalid_files_are_reported() {
    let garbage = write_config(".toml", "grace_window_ms = \"soon\"");
    assert!(RegistryConfig::load_from_file(garbage.path()).is_err());

    let unknown_role = write_config(".toml", "[min_bonds]\njanitor = 5\n");
    let config = RegistryConfig::load_from_file(unknown_role.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("janitor"), "{err}");

    let zero_timeout = write_config(".toml", "evidence_timeout_ms = 0\n");
    assert!(RegistryConfig::load(zero_timeout.path()).is_err());

    let missing = std::path::Path::new("/nonexistent/bonded-roles.toml");
    assert!(RegistryConfig::load_from_file(missing).is_err());
}

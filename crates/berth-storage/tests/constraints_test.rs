//! Constraint defaulting and validation driven by configuration.

use berth_storage::CharmMeta;
use berth_storage::CharmStorage;
use berth_storage::ConstraintResolver;
use berth_storage::ConstraintsMap;
use berth_storage::StorageConfig;
use berth_storage::StorageConstraints;
use berth_storage::StorageError;
use berth_storage::StorageKind;
use bytesize::ByteSize;

const EC2_CONFIG: &str = r#"
[environ]
env_type = "ec2"
default_block_pool = "fast"

[[pools]]
name = "fast"
provider = "ebs"

[pools.attrs]
volume-type = "gp3"
"#;

fn mysql() -> CharmMeta {
    CharmMeta::new("mysql")
        .with_storage("data", CharmStorage::block().with_count(1, 3))
        .with_storage("logs", CharmStorage::filesystem().with_count(0, -1).with_minimum_size(2048))
}

#[test]
fn defaults_round_trip_through_validation() {
    let resolver = ConstraintResolver::from_config(&StorageConfig::default()).unwrap();
    let charm = CharmMeta::new("mysql").with_storage("data", CharmStorage::block());

    let mut cons = ConstraintsMap::new();
    resolver.apply_defaults(&mut cons, &charm).unwrap();
    assert_eq!(cons, ConstraintsMap::from([("data".to_string(), StorageConstraints::new("loop", 1024, 1))]));
    resolver.validate(&cons, &charm).unwrap();

    // Defaulting an already defaulted map changes nothing.
    let before = cons.clone();
    resolver.apply_defaults(&mut cons, &charm).unwrap();
    assert_eq!(cons, before);
}

#[test]
fn configured_default_pool_is_used() {
    let config = StorageConfig::from_toml_str(EC2_CONFIG).unwrap();
    let resolver = ConstraintResolver::from_config(&config).unwrap();
    let charm = CharmMeta::new("mysql").with_storage("data", CharmStorage::block());

    let mut cons = ConstraintsMap::new();
    resolver.apply_defaults(&mut cons, &charm).unwrap();
    assert_eq!(cons["data"].pool, "fast");
    resolver.validate(&cons, &charm).unwrap();
}

#[test]
fn missing_filesystem_default_is_distinguished() {
    let resolver = ConstraintResolver::from_config(&StorageConfig::default()).unwrap();
    let mut cons = ConstraintsMap::new();

    let err = resolver.apply_defaults(&mut cons, &mysql()).unwrap_err();
    match err {
        StorageError::NoDefaultPool { storage } => assert_eq!(storage, "logs"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn pool_name_may_be_a_provider_type() {
    let resolver = ConstraintResolver::from_config(&StorageConfig::default()).unwrap();
    let cons = ConstraintsMap::from([
        ("data".to_string(), StorageConstraints::new("loop", 1024, 1)),
        ("logs".to_string(), StorageConstraints::new("tmpfs", 4096, 2)),
    ]);
    resolver.validate(&cons, &mysql()).unwrap();

    let cons = ConstraintsMap::from([("data".to_string(), StorageConstraints::new("missing", 1024, 1))]);
    let err = resolver.validate(&cons, &mysql()).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().ends_with("pool \"missing\" not found"));
}

#[test]
fn size_violations_are_reported_in_human_units() {
    let resolver = ConstraintResolver::from_config(&StorageConfig::default()).unwrap();
    let cons = ConstraintsMap::from([
        ("data".to_string(), StorageConstraints::new("loop", 1024, 1)),
        ("logs".to_string(), StorageConstraints::new("tmpfs", 512, 1)),
    ]);
    let err = resolver.validate(&cons, &mysql()).unwrap_err();
    assert!(err.is_validation());
    let expected = format!("minimum storage size is {}, {} specified", ByteSize::mib(2048), ByteSize::mib(512));
    assert!(err.to_string().contains(&expected), "{err}");
}

#[test]
fn shared_storage_is_not_supported() {
    let resolver = ConstraintResolver::from_config(&StorageConfig::default()).unwrap();
    let charm = CharmMeta::new("mysql").with_storage("data", CharmStorage::block().shared());
    let cons = ConstraintsMap::from([("data".to_string(), StorageConstraints::new("loop", 1024, 1))]);

    let err = resolver.validate(&cons, &charm).unwrap_err();
    assert!(matches!(err.root(), StorageError::NotSupported { .. }));
    assert!(err.is_validation());
}

#[test]
fn unsupported_environment_provider() {
    let config = StorageConfig::from_toml_str(EC2_CONFIG).unwrap();
    let StorageConfig { pools, .. } = config;
    let config = StorageConfig {
        pools,
        ..StorageConfig::default()
    };
    let resolver = ConstraintResolver::from_config(&config).unwrap();
    let cons = ConstraintsMap::from([("data".to_string(), StorageConstraints::new("fast", 1024, 1))]);

    let err = resolver.validate(&cons, &mysql()).unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("not supported for environments of type \"dummy\""));
}

#[test]
fn machine_binding_follows_provider_scope() {
    let config = StorageConfig::from_toml_str(EC2_CONFIG).unwrap();
    let resolver = ConstraintResolver::from_config(&config).unwrap();

    assert_eq!(resolver.validate_pool_for_machine("fast", StorageKind::Block, "3").unwrap(), None);
    assert_eq!(
        resolver.validate_pool_for_machine("rootfs", StorageKind::Filesystem, "3").unwrap(),
        Some("3".to_string())
    );
}

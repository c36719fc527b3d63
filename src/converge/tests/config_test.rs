use converge::{ConfigError, DeploymentProfile, RecoveryConfig, TargetConfig};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults() {
    let config = RecoveryConfig::default();
    assert_eq!(config.profile, DeploymentProfile::Standard);
    assert_eq!(config.default_timeout(), Duration::from_secs(900));
    assert_eq!(config.poll_interval(), Duration::from_secs(10));
    assert_eq!(config.command_timeout(), Duration::from_secs(60));
    assert!(!config.parallel);
    assert_eq!(config.operator_object, "cluster");

    let containers: Vec<&str> = config.containers.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        containers,
        vec!["etcd", "kube-apiserver", "kube-controller-manager", "kube-scheduler"]
    );
    let operators: Vec<&str> = config.operators.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        operators,
        vec!["etcd", "kubeapiserver", "kubecontrollermanager", "kubescheduler"]
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_toml_is_default() {
    let config = RecoveryConfig::from_toml_str("").unwrap();
    assert_eq!(config.containers.len(), 4);
    assert_eq!(config.default_timeout(), Duration::from_secs(900));
}

#[test]
fn test_single_node_profile() {
    let config = RecoveryConfig::from_toml_str(r#"profile = "single-node""#).unwrap();
    assert_eq!(config.profile, DeploymentProfile::SingleNode);
    assert_eq!(config.default_timeout(), Duration::from_secs(1200));
}

#[test]
fn test_explicit_timeout_overrides_profile() {
    let config = RecoveryConfig::from_toml_str(
        r#"
        profile = "single-node"
        timeout_secs = 300
        "#,
    )
    .unwrap();
    assert_eq!(config.default_timeout(), Duration::from_secs(300));
}

#[test]
fn test_mixed_target_forms() {
    let config = RecoveryConfig::from_toml_str(
        r#"
        poll_interval_secs = 5
        parallel = true
        kubeconfig = "/etc/kubernetes/static-pod-resources/kube-apiserver-certs/secrets/node-kubeconfigs/localhost.kubeconfig"
        containers = ["etcd", { name = "kube-apiserver", timeout_secs = 1800 }]
        operators = [{ name = "kubeapiserver" }]
        "#,
    )
    .unwrap();

    assert_eq!(config.poll_interval(), Duration::from_secs(5));
    assert!(config.parallel);
    assert!(config.kubeconfig.is_some());
    assert_eq!(config.containers[0], TargetConfig::named("etcd"));
    assert_eq!(config.containers[1].timeout_secs, Some(1800));
    assert_eq!(
        config.timeout_for(&config.containers[1]),
        Duration::from_secs(1800)
    );
    assert_eq!(
        config.timeout_for(&config.containers[0]),
        Duration::from_secs(900)
    );
    assert_eq!(config.operators, vec![TargetConfig::named("kubeapiserver")]);
}

#[test]
fn test_validation_errors() {
    for toml in [
        "poll_interval_secs = 0",
        "timeout_secs = 0",
        "command_timeout_secs = 0",
        r#"containers = ["etcd", "etcd"]"#,
        r#"containers = [" "]"#,
        r#"operators = [{ name = "etcd", timeout_secs = 0 }]"#,
    ] {
        match RecoveryConfig::from_toml_str(toml) {
            Err(ConfigError::Invalid(_)) => {}
            other => panic!("{:?} should be invalid, got {:?}", toml, other),
        }
    }
}

#[test]
fn test_same_name_in_both_sections_is_allowed() {
    let config = RecoveryConfig::from_toml_str(
        r#"
        containers = ["etcd"]
        operators = ["etcd"]
        "#,
    );
    assert!(config.is_ok());
}

#[test]
fn test_unknown_profile_is_parse_error() {
    assert!(matches!(
        RecoveryConfig::from_toml_str(r#"profile = "tiny""#),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "oc_path = \"/usr/local/bin/oc\"").unwrap();
    writeln!(file, "operators = [\"etcd\"]").unwrap();

    let config = RecoveryConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.oc_path, "/usr/local/bin/oc");
    assert_eq!(config.operators.len(), 1);
    assert_eq!(config.crictl_path, "crictl");
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        RecoveryConfig::load(Some(&missing)),
        Err(ConfigError::Read { .. })
    ));
}

#[test]
fn test_load_invalid_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "poll_interval_secs = 0").unwrap();
    assert!(matches!(
        RecoveryConfig::load(Some(file.path())),
        Err(ConfigError::Invalid(_))
    ));
}

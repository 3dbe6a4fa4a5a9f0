//! Daemon assembly from config files.

use std::path::Path;
use std::time::Duration;

use greyline_core::GreylineConfig;
use greyline_core::config::ClassifierConfig;

fn write_config(
    dir: &Path,
    state_path: Option<&Path>,
    warning_after: u64,
    critical_after: u64,
) -> GreylineConfig {
    let state_line = state_path
        .map(|p| format!("state_path = {:?}", p.display().to_string()))
        .unwrap_or_default();
    let body = format!(
        r#"
[agent]
interval = "10ms"
{state_line}

[[cluster.nodes]]
id = "node-1"
address = "10.0.0.1"

[[cluster.nodes]]
id = "node-2-unstable"
address = "10.0.0.2"

[classifier]
kind = "scripted"
warning_after = {warning_after}
critical_after = {critical_after}

[metrics]
kind = "static"

[healer]
address_template = "10.0.1.{{i}}"
provision_delay = "0ms"
membership_delay = "0ms"

[alerting]
enabled = false
"#
    );
    let path = dir.join("greyline.toml");
    std::fs::write(&path, body).unwrap();
    GreylineConfig::from_file(&path).unwrap()
}

#[test]
fn sample_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../greyline.toml");
    let config = GreylineConfig::from_file(&path).unwrap();

    assert_eq!(config.cluster.nodes.len(), 5);
    assert_eq!(config.classifier.mode(), "scripted");
    assert_eq!(config.agent.interval(), Duration::from_secs(15));
}

#[tokio::test]
async fn scripted_run_replaces_unstable_node() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), None, 2, 4);
    let mut control = greylined::build(&config, Duration::from_millis(10)).unwrap();

    // call 2 is node-2-unstable: warning, expand
    control.run_cycle().await.unwrap();
    assert!(control.state().is_greylisted("node-2-unstable"));
    assert!(control.state().contains("node-new-1"));

    // call 4 is node-2-unstable again: critical, replace
    let report = control.run_cycle().await.unwrap();
    assert!(report.halted_on_critical);
    let state = control.state();
    assert!(!state.contains("node-2-unstable"));
    assert!(state.contains("node-new-2"));
    assert_eq!(state.greylisted().count(), 0);
    assert!(state.is_consistent());
}

#[tokio::test]
async fn persisted_state_is_restored_and_numbering_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state").join("greyline.redb");
    let config = write_config(dir.path(), Some(&state_path), 1, 3);

    {
        let mut control = greylined::build(&config, Duration::from_millis(10)).unwrap();
        let report = control.run_cycle().await.unwrap();
        assert!(report.state_changed);
    }
    assert!(state_path.exists());

    let mut control = greylined::build(&config, Duration::from_millis(10)).unwrap();
    let state = control.state();
    assert_eq!(state.len(), 3);
    assert!(state.contains("node-new-1"));
    assert!(state.is_greylisted("node-2-unstable"));

    // a fresh classifier: call 2 re-alerts, call 5 replaces
    control.run_cycle().await.unwrap();
    control.run_cycle().await.unwrap();
    let state = control.state();
    assert!(!state.contains("node-2-unstable"));
    assert!(state.contains("node-new-2"));
}

#[test]
fn llm_classifier_requires_api_key() {
    let config = ClassifierConfig::Llm {
        model: "gpt-4-turbo".into(),
        base_url: "http://127.0.0.1:9".into(),
        api_key_env: "GREYLINE_TEST_KEY_NEVER_SET".into(),
        timeout: "1s".into(),
    };

    let Err(err) = greylined::build_classifier(&config) else {
        panic!("expected a missing key error");
    };
    assert!(err.to_string().contains("GREYLINE_TEST_KEY_NEVER_SET"));
}

#[test]
fn interval_flag_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), None, 2, 4);

    assert_eq!(
        greylined::resolve_interval(&config, Some("250ms")).unwrap(),
        Duration::from_millis(250)
    );
    assert_eq!(
        greylined::resolve_interval(&config, None).unwrap(),
        Duration::from_millis(10)
    );
    assert!(greylined::resolve_interval(&config, Some("soon")).is_err());
    assert!(greylined::resolve_interval(&config, Some("0ms")).is_err());
}

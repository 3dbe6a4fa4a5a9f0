//! Daemon wiring: config → ports → [`ControlLoop`].
//!
//! Kept out of `main.rs` so the assembly can be exercised from tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{debug, info};

use greyline_classify::{Classifier, LlmClassifier, LlmSettings, RuleClassifier, ScriptedClassifier};
use greyline_core::config::{ClassifierConfig, MetricsConfig};
use greyline_core::{GreylineConfig, parse_duration};
use greyline_engine::{ControlLoop, EscalationEngine};
use greyline_healer::{Healer, LogSink, SequenceGenerator};
use greyline_metrics::{MetricsSource, SimulatedMetricsSource, StaticMetricsSource};
use greyline_state::{ClusterState, StateStore};

/// Build a ready-to-run control loop from `config`.
///
/// When `agent.state_path` is set, persisted state is restored from it and
/// the loop saves back to it; otherwise the configured node list is used.
pub fn build(config: &GreylineConfig, interval: Duration) -> anyhow::Result<ControlLoop> {
    let store = config
        .agent
        .state_path
        .as_deref()
        .map(|p| open_store(Path::new(p)))
        .transpose()?;
    let state = initial_state(config, store.as_ref())?;

    let sequence = Arc::new(SequenceGenerator::resume(&config.healer.id_prefix, state.nodes()));
    let healer = Healer::from_config(&config.healer, &config.alerting, sequence, Arc::new(LogSink));
    let engine = EscalationEngine::new(Arc::new(healer), &config.alerting.recipient);

    let classifier = build_classifier(&config.classifier)?;
    let metrics = build_metrics(&config.metrics);

    banner(config, &state, interval);

    let control = ControlLoop::new(state, metrics, classifier, engine, interval);
    Ok(match store {
        Some(store) => control.with_store(store),
        None => control,
    })
}

/// `--interval` if given, else `agent.interval`. Zero is rejected.
pub fn resolve_interval(config: &GreylineConfig, flag: Option<&str>) -> anyhow::Result<Duration> {
    let interval = match flag {
        Some(raw) => {
            parse_duration(raw).with_context(|| format!("invalid --interval {raw:?}"))?
        }
        None => config.agent.interval(),
    };
    if interval.is_zero() {
        bail!("interval must be greater than zero");
    }
    Ok(interval)
}

fn open_store(path: &Path) -> anyhow::Result<StateStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating state directory {}", parent.display()))?;
    }
    let store = StateStore::open(path)
        .with_context(|| format!("opening state store {}", path.display()))?;
    info!(path = %path.display(), "state store opened");
    Ok(store)
}

fn initial_state(
    config: &GreylineConfig,
    store: Option<&StateStore>,
) -> anyhow::Result<ClusterState> {
    if let Some(store) = store {
        if let Some(state) = store.load_cluster().context("loading persisted cluster state")? {
            info!(
                nodes = state.len(),
                greylisted = state.greylisted().count(),
                "restored cluster state"
            );
            return Ok(state);
        }
        debug!("no persisted state, starting from configured nodes");
    }
    ClusterState::new(config.cluster.nodes.iter().cloned()).context("building cluster state")
}

pub fn build_classifier(config: &ClassifierConfig) -> anyhow::Result<Arc<dyn Classifier>> {
    Ok(match config {
        ClassifierConfig::Rules => Arc::new(RuleClassifier::default()),
        ClassifierConfig::Scripted {
            warning_after,
            critical_after,
            unstable_marker,
        } => Arc::new(ScriptedClassifier::new(
            *warning_after,
            *critical_after,
            unstable_marker.as_str(),
        )),
        ClassifierConfig::Llm {
            model,
            base_url,
            api_key_env,
            timeout,
        } => {
            let Ok(api_key) = std::env::var(api_key_env) else {
                bail!("llm classifier needs an API key in ${api_key_env}");
            };
            if api_key.trim().is_empty() {
                bail!("${api_key_env} is empty");
            }
            let timeout = parse_duration(timeout)
                .with_context(|| format!("invalid classifier timeout {timeout:?}"))?;
            let classifier = LlmClassifier::new(LlmSettings {
                model: model.clone(),
                base_url: base_url.clone(),
                api_key,
                timeout,
            })?;
            Arc::new(classifier)
        }
    })
}

pub fn build_metrics(config: &MetricsConfig) -> Arc<dyn MetricsSource> {
    match config {
        MetricsConfig::Simulated { unstable_marker } => {
            Arc::new(SimulatedMetricsSource::new(unstable_marker.as_str()))
        }
        MetricsConfig::Static => Arc::new(StaticMetricsSource::new()),
    }
}

fn banner(config: &GreylineConfig, state: &ClusterState, interval: Duration) {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        nodes = state.len(),
        interval_ms = interval.as_millis() as u64,
        classifier = config.classifier.mode(),
        alerting = config.alerting.enabled,
        "greyline cluster health controller starting"
    );
    info!("monitored nodes:\n{}", state.snapshot());
}

//! # Options
//!
//! Runtime configuration, parsed once at startup. Feature flags gate which
//! adapter set is active; everything else tunes the reload engine itself.

use clap::Parser;

use crate::constants::{DEFAULT_METRICS_PORT, DEFAULT_RELOAD_DELAY_SECS};
use crate::strategy::ReloadStrategy;

#[derive(Parser, Clone, Debug)]
#[command(
    name = "workload-reloader",
    version,
    about = "Performs rolling restarts of workloads when the ConfigMaps/Secrets they consume change"
)]
pub struct Options {
    /// How a rollout is forced: injected env vars keyed by content hash, or
    /// a pod-template annotation stamp.
    #[arg(long, value_enum, default_value = "env-vars")]
    pub reload_strategy: ReloadStrategy,

    /// Reload workloads that consume a changed resource even when they carry
    /// no reload annotation at all.
    #[arg(long)]
    pub auto_reload_all: bool,

    /// Also watch OpenShift DeploymentConfigs.
    #[arg(long)]
    pub enable_openshift: bool,

    /// Also watch Argo Rollouts.
    #[arg(long)]
    pub enable_argo_rollouts: bool,

    /// Debounce window for workloads annotated for delayed upgrades, in
    /// seconds.
    #[arg(long, default_value_t = DEFAULT_RELOAD_DELAY_SECS)]
    pub reload_delay_seconds: u64,

    /// Webhook notified (fire-and-forget) after each successful reload.
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Restrict watching to a single namespace instead of the whole cluster.
    #[arg(long)]
    pub namespace: Option<String>,

    /// HTTP port for metrics and health probes.
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reload_strategy: ReloadStrategy::EnvVars,
            auto_reload_all: false,
            enable_openshift: false,
            enable_argo_rollouts: false,
            reload_delay_seconds: DEFAULT_RELOAD_DELAY_SECS,
            webhook_url: None,
            namespace: None,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

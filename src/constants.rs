//! # Constants
//!
//! Annotation keys and shared defaults used throughout the controller.
//!
//! The annotation keys keep the `reloader.stakater.com` domain so the
//! controller is a drop-in replacement for workloads already annotated for
//! that ecosystem.

/// Manual reload annotation for ConfigMaps: comma-separated resource-name
/// patterns, each matched as a whole-string regular expression.
pub const CONFIGMAP_RELOAD_ANNOTATION: &str = "configmap.reloader.stakater.com/reload";

/// Manual reload annotation for Secrets.
pub const SECRET_RELOAD_ANNOTATION: &str = "secret.reloader.stakater.com/reload";

/// Generic auto-reload annotation: boolean string on the workload.
pub const RELOADER_AUTO_ANNOTATION: &str = "reloader.stakater.com/auto";

/// Kind-specific auto-reload annotation for ConfigMaps.
pub const CONFIGMAP_AUTO_ANNOTATION: &str = "configmap.reloader.stakater.com/auto";

/// Kind-specific auto-reload annotation for Secrets.
pub const SECRET_AUTO_ANNOTATION: &str = "secret.reloader.stakater.com/auto";

/// Search annotation on the workload; pairs with [`SEARCH_MATCH_ANNOTATION`]
/// on the ConfigMap/Secret itself.
pub const AUTO_SEARCH_ANNOTATION: &str = "reloader.stakater.com/search";

/// Match annotation read from the ConfigMap/Secret when search is enabled.
pub const SEARCH_MATCH_ANNOTATION: &str = "reloader.stakater.com/match";

/// Exclusion list for ConfigMaps: comma-separated resource names, exact
/// match after trimming.
pub const CONFIGMAP_EXCLUDE_ANNOTATION: &str = "configmap.reloader.stakater.com/exclude";

/// Exclusion list for Secrets.
pub const SECRET_EXCLUDE_ANNOTATION: &str = "secret.reloader.stakater.com/exclude";

/// Presence of this annotation diverts changes into the delayed-upgrade
/// coalescer. The value is currently unread; a configurable per-workload
/// delay is a possible future extension.
pub const DELAYED_UPGRADE_ANNOTATION: &str = "reloader.stakater.com/delayed-upgrade";

/// ConfigMaps/Secrets carrying this annotation with value `"true"` are
/// never treated as changed.
pub const IGNORE_ANNOTATION: &str = "reloader.stakater.com/ignore";

/// Pod-template annotation written by the annotation reload strategy. Only
/// the most recent reload is kept to bound annotation size.
pub const LAST_RELOADED_FROM_ANNOTATION: &str = "reloader.stakater.com/last-reloaded-from";

/// Prefix of environment variables injected by the env-var reload strategy.
pub const ENV_VAR_PREFIX: &str = "STAKATER_";

/// Env-var name suffix for ConfigMap-sourced changes.
pub const CONFIGMAP_ENV_VAR_POSTFIX: &str = "CONFIGMAP";

/// Env-var name suffix for Secret-sourced changes.
pub const SECRET_ENV_VAR_POSTFIX: &str = "SECRET";

/// Annotation set on Jobs created from a CronJob, mirroring what `kubectl
/// create job --from=cronjob/...` stamps.
pub const CRONJOB_INSTANTIATE_ANNOTATION: &str = "cronjob.kubernetes.io/instantiate";

/// Default debounce window for delayed upgrades (seconds).
pub const DEFAULT_RELOAD_DELAY_SECS: u64 = 10;

/// Default HTTP server port for metrics and health probes.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

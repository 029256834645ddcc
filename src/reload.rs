//! # Reload Engine
//!
//! The decision core. For every detected change, each active adapter's
//! workloads are evaluated against the reload annotations, in a fixed
//! precedence order:
//!
//! 1. exclusion list (skips the change entirely),
//! 2. delayed-upgrade diversion into the coalescer,
//! 3. auto reload (typed or generic annotation, or the global default),
//! 4. manual annotation match (anchored regex per comma-separated token),
//! 5. search/match annotation pair.
//!
//! Evaluation mutates the in-memory item through the configured strategy;
//! the adapter writes it back once per item when at least one change
//! produced an update.

use std::collections::BTreeMap;
use std::slice;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_runtime::events::Recorder;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::adapters::{active_adapters, ResourceAdapter, UpdateError};
use crate::change::ChangeConfig;
use crate::constants::{
    AUTO_SEARCH_ANNOTATION, DELAYED_UPGRADE_ANNOTATION, RELOADER_AUTO_ANNOTATION,
    SEARCH_MATCH_ANNOTATION,
};
use crate::delayed::{BatchKey, DelayedUpdates};
use crate::observability::{events, metrics, webhook};
use crate::options::Options;
use crate::strategy::{self, UpdateResult};
use crate::workload::WorkloadItem;

/// How a single change relates to a single workload.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigDisposition {
    /// The resource is on the workload's exclusion list.
    Excluded,
    /// The workload is annotated for delayed upgrades; the change belongs in
    /// a batch instead of immediate evaluation.
    Delayed,
    Evaluated(UpdateResult),
}

/// Aggregated evaluation of a set of pending changes against one workload.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// At least one change produced an update; the item must be written back.
    pub updated: bool,
    /// Changes diverted to the delayed-upgrade coalescer.
    pub delayed: Vec<ChangeConfig>,
    /// The change evaluated last, used for reporting.
    pub last_evaluated: Option<ChangeConfig>,
}

/// The reload engine: adapters for the active workload kinds, the selected
/// strategy, and the delayed-upgrade registry. Cheap to clone; clones share
/// the client, the adapters, and the delayed-batch registry.
#[derive(Clone)]
pub struct Reloader {
    pub client: Client,
    pub options: Options,
    adapters: Vec<Arc<dyn ResourceAdapter>>,
    recorder: Arc<Recorder>,
    delayed: DelayedUpdates,
}

impl std::fmt::Debug for Reloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reloader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Reloader {
    pub fn new(client: Client, options: Options) -> Self {
        let adapters = active_adapters(&options);
        let delayed = DelayedUpdates::new(Duration::from_secs(options.reload_delay_seconds));
        let recorder = Arc::new(events::recorder(client.clone()));
        Self {
            client,
            options,
            adapters,
            recorder,
            delayed,
        }
    }

    /// Entry point for the watch layer: run one change through every active
    /// workload kind. A failed update stops the remaining kinds for this
    /// change; the watch layer redelivers on the next change.
    pub async fn apply_change(&self, change: ChangeConfig) -> Result<(), UpdateError> {
        info!(
            resource = %change.resource_name,
            kind = %change.kind,
            namespace = %change.namespace,
            "processing change"
        );
        for adapter in &self.adapters {
            if let Err(err) = self.rolling_upgrade(adapter, &change).await {
                error!(
                    resource = %change.resource_name,
                    kind = %adapter.kind(),
                    error = %err,
                    "rolling upgrade failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    async fn rolling_upgrade(
        &self,
        adapter: &Arc<dyn ResourceAdapter>,
        change: &ChangeConfig,
    ) -> Result<(), UpdateError> {
        let items = adapter.list_items(&self.client, &change.namespace).await;
        for item in items {
            self.process_item(adapter, item, slice::from_ref(change), true)
                .await?;
        }
        Ok(())
    }

    /// Evaluate the pending changes against one workload and, when warranted,
    /// write the mutated item back and report the outcome.
    async fn process_item(
        &self,
        adapter: &Arc<dyn ResourceAdapter>,
        mut item: WorkloadItem,
        configs: &[ChangeConfig],
        allow_delayed: bool,
    ) -> Result<(), UpdateError> {
        let evaluation = evaluate_item(&mut item, configs, &self.options, allow_delayed);

        for change in evaluation.delayed {
            self.enqueue_delayed(adapter, &item, change);
        }

        if !evaluation.updated {
            return Ok(());
        }
        let Some(change) = evaluation.last_evaluated else {
            return Ok(());
        };

        let name = item.name().to_string();
        let kind = adapter.kind();
        match adapter.apply_update(&self.client, &change.namespace, &item).await {
            Err(err) => {
                let message = format!(
                    "Update for '{name}' of type '{kind}' in namespace '{namespace}' failed",
                    namespace = change.namespace
                );
                error!(error = %err, "{message}");
                metrics::record_reload(&change.namespace, false);
                events::publish_reload_failed(&self.recorder, &item, &message).await;
                Err(err)
            }
            Ok(()) => {
                let message = format!(
                    "Changes detected in '{resource}' of type '{source_kind}' in namespace '{namespace}'; updated '{name}' of type '{kind}'",
                    resource = change.resource_name,
                    source_kind = change.kind,
                    namespace = change.namespace
                );
                info!("{message}");
                metrics::record_reload(&change.namespace, true);
                events::publish_reloaded(&self.recorder, &item, &message).await;
                if let Some(url) = self.options.webhook_url.clone() {
                    webhook::spawn_success_webhook(url);
                }
                webhook::spawn_reload_alert(message);
                Ok(())
            }
        }
    }

    fn enqueue_delayed(
        &self,
        adapter: &Arc<dyn ResourceAdapter>,
        item: &WorkloadItem,
        change: ChangeConfig,
    ) {
        let key = BatchKey {
            kind: adapter.kind(),
            namespace: change.namespace.clone(),
            name: item.name().to_string(),
        };
        let engine = self.clone();
        let adapter = Arc::clone(adapter);
        let flush_key = key.clone();
        self.delayed.enqueue(key, change, move |configs| async move {
            engine.flush_delayed(adapter, flush_key, configs).await;
        });
    }

    /// Runs when a delayed batch's window closes: re-resolve the live item
    /// (it may have been re-listed or deleted since) and evaluate the whole
    /// batch in one pass, with delayed handling disabled so the batch cannot
    /// re-enqueue itself.
    async fn flush_delayed(
        &self,
        adapter: Arc<dyn ResourceAdapter>,
        key: BatchKey,
        configs: Vec<ChangeConfig>,
    ) {
        info!(
            workload = %key.name,
            namespace = %key.namespace,
            pending = configs.len(),
            "performing delayed upgrade"
        );
        let items = adapter.list_items(&self.client, &key.namespace).await;
        let Some(item) = items.into_iter().find(|item| item.name() == key.name) else {
            warn!(
                workload = %key.name,
                namespace = %key.namespace,
                "workload no longer present, dropping delayed batch"
            );
            return;
        };
        if let Err(err) = self.process_item(&adapter, item, &configs, false).await {
            error!(workload = %key.name, error = %err, "delayed upgrade failed");
        }
    }
}

/// Evaluate all pending changes against one workload, aggregating with
/// `Updated` dominating. Pure apart from mutating the in-memory item.
pub fn evaluate_item(
    item: &mut WorkloadItem,
    configs: &[ChangeConfig],
    options: &Options,
    allow_delayed: bool,
) -> Evaluation {
    let mut evaluation = Evaluation::default();
    for change in configs {
        match evaluate_config(item, change, options, allow_delayed) {
            ConfigDisposition::Excluded => {
                debug!(
                    resource = %change.resource_name,
                    workload = %item.name(),
                    "resource is excluded, skipping"
                );
            }
            ConfigDisposition::Delayed => evaluation.delayed.push(change.clone()),
            ConfigDisposition::Evaluated(result) => {
                debug!(
                    resource = %change.resource_name,
                    workload = %item.name(),
                    ?result,
                    "evaluated change"
                );
                evaluation.last_evaluated = Some(change.clone());
                if result == UpdateResult::Updated {
                    evaluation.updated = true;
                }
            }
        }
    }
    evaluation
}

/// Evaluate a single change against a single workload.
pub fn evaluate_config(
    item: &mut WorkloadItem,
    change: &ChangeConfig,
    options: &Options,
    allow_delayed: bool,
) -> ConfigDisposition {
    let workload_annotations = item.annotations();
    let mut manual = lookup(workload_annotations, change.kind.reload_annotation());
    let mut auto = lookup(workload_annotations, RELOADER_AUTO_ANNOTATION);
    let mut typed_auto = lookup(workload_annotations, change.kind.typed_auto_annotation());
    let mut search = lookup(workload_annotations, AUTO_SEARCH_ANNOTATION);
    // Exclusion and delay are only honored on the workload itself.
    let exclude = lookup(workload_annotations, change.kind.exclude_annotation());
    let delayed = workload_annotations
        .is_some_and(|annotations| annotations.contains_key(DELAYED_UPGRADE_ANNOTATION));

    // Some operators annotate the pod spec instead of the workload; fall
    // back there when the workload carries none of the reload keys.
    if manual.is_none() && auto.is_none() && typed_auto.is_none() && search.is_none() {
        let pod_annotations = item.pod_annotations();
        manual = lookup(pod_annotations, change.kind.reload_annotation());
        auto = lookup(pod_annotations, RELOADER_AUTO_ANNOTATION);
        typed_auto = lookup(pod_annotations, change.kind.typed_auto_annotation());
        search = lookup(pod_annotations, AUTO_SEARCH_ANNOTATION);
    }

    if let Some(excluded) = &exclude {
        if excluded
            .split(',')
            .any(|token| token.trim() == change.resource_name)
        {
            return ConfigDisposition::Excluded;
        }
    }

    if allow_delayed && delayed {
        info!(
            workload = %item.name(),
            resource = %change.resource_name,
            "workload has delayed upgrade enabled"
        );
        return ConfigDisposition::Delayed;
    }

    let mut result = UpdateResult::NotUpdated;

    let auto_enabled = auto.as_deref().is_some_and(annotation_bool);
    let typed_auto_enabled = typed_auto.as_deref().is_some_and(annotation_bool);
    let both_unset = auto.as_deref().unwrap_or_default().is_empty()
        && typed_auto.as_deref().unwrap_or_default().is_empty();
    if auto_enabled || typed_auto_enabled || (both_unset && options.auto_reload_all) {
        result = strategy::invoke(options.reload_strategy, item, change, true);
    }

    if result != UpdateResult::Updated {
        if let Some(patterns) = manual.as_deref().filter(|value| !value.is_empty()) {
            for token in patterns.split(',') {
                let token = token.trim();
                // Tokens are whole-string patterns: "foo" must not match
                // "foobar".
                match Regex::new(&format!("^{token}$")) {
                    Ok(pattern) if pattern.is_match(&change.resource_name) => {
                        result = strategy::invoke(options.reload_strategy, item, change, false);
                        if result == UpdateResult::Updated {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(
                            workload = %item.name(),
                            token,
                            error = %err,
                            "invalid reload annotation pattern, skipping"
                        );
                    }
                }
            }
        }
    }

    if result != UpdateResult::Updated && search.as_deref() == Some("true") {
        let matched = change
            .resource_annotations
            .get(SEARCH_MATCH_ANNOTATION)
            .map(String::as_str)
            == Some("true");
        if matched {
            result = strategy::invoke(options.reload_strategy, item, change, true);
        }
    }

    ConfigDisposition::Evaluated(result)
}

fn lookup(annotations: Option<&BTreeMap<String, String>>, key: &str) -> Option<String> {
    annotations.and_then(|map| map.get(key)).cloned()
}

// The truthy set strconv.ParseBool accepts, since these annotations are
// written by hand in manifests of varying style.
fn annotation_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True")
}

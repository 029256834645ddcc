//! # Kubernetes Events
//!
//! `Reloaded`/`ReloadFail` Events attached to the workload that was (or
//! failed to be) rolled. Publishing problems are logged and swallowed; an
//! Event is never worth failing the reload path over.

use kube::Client;
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use tracing::warn;

use crate::workload::WorkloadItem;

const REPORTER: &str = "workload-reloader";

/// Build the process-wide event recorder. The reporting instance is the pod
/// name when running in-cluster so events from replicas stay attributable.
pub fn recorder(client: Client) -> Recorder {
    Recorder::new(
        client,
        Reporter {
            controller: REPORTER.into(),
            instance: std::env::var("POD_NAME").ok(),
        },
    )
}

pub async fn publish_reloaded(recorder: &Recorder, item: &WorkloadItem, note: &str) {
    publish(recorder, item, EventType::Normal, "Reloaded", note).await;
}

pub async fn publish_reload_failed(recorder: &Recorder, item: &WorkloadItem, note: &str) {
    publish(recorder, item, EventType::Warning, "ReloadFail", note).await;
}

async fn publish(
    recorder: &Recorder,
    item: &WorkloadItem,
    type_: EventType,
    reason: &str,
    note: &str,
) {
    let event = Event {
        type_,
        reason: reason.to_string(),
        note: Some(note.to_string()),
        action: "Reload".to_string(),
        secondary: None,
    };
    if let Err(err) = recorder.publish(&event, &item.object_ref()).await {
        warn!(
            workload = %item.name(),
            namespace = %item.namespace(),
            error = %err,
            "failed to publish event"
        );
    }
}

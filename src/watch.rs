//! # Watch Layer
//!
//! Watcher streams over ConfigMaps and Secrets. Each stream keeps a cache of
//! the last-seen content hash per resource; the initial listing primes the
//! cache without firing, and a change event fires only when the stored hash
//! differs. Stream errors are logged and counted; the watcher reconnects on
//! its own.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube_runtime::watcher;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::change::{ChangeConfig, SourceKind};
use crate::constants::IGNORE_ANNOTATION;
use crate::hashing;
use crate::observability::metrics;
use crate::reload::Reloader;

pub fn start_configmap_watch(engine: Arc<Reloader>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api: Api<ConfigMap> = scoped_api(&engine);
        watch_resources(engine, api, SourceKind::ConfigMap, hashing::hash_configmap).await;
    })
}

pub fn start_secret_watch(engine: Arc<Reloader>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api: Api<Secret> = scoped_api(&engine);
        watch_resources(engine, api, SourceKind::Secret, hashing::hash_secret).await;
    })
}

fn scoped_api<K>(engine: &Reloader) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match engine.options.namespace.as_deref() {
        Some(namespace) => Api::namespaced(engine.client.clone(), namespace),
        None => Api::all(engine.client.clone()),
    }
}

async fn watch_resources<K>(
    engine: Arc<Reloader>,
    api: Api<K>,
    kind: SourceKind,
    hash: fn(&K) -> String,
) where
    K: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug + Send + 'static,
{
    let mut hashes: HashMap<String, String> = HashMap::new();
    let stream = watcher(api, watcher::Config::default());
    pin_mut!(stream);

    info!(kind = %kind, "watch started");

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(resource) | watcher::Event::InitApply(resource)) => {
                handle_resource(&engine, &mut hashes, kind, hash, resource).await;
            }
            Ok(watcher::Event::Delete(resource)) => {
                hashes.remove(&cache_key(resource.meta()));
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(err) => {
                error!(kind = %kind, error = %err, "watch error");
                metrics::record_watch_error(kind.as_str());
            }
        }
    }

    warn!(kind = %kind, "watch stream ended");
}

async fn handle_resource<K: kube::Resource>(
    engine: &Arc<Reloader>,
    hashes: &mut HashMap<String, String>,
    kind: SourceKind,
    hash: fn(&K) -> String,
    resource: K,
) {
    let meta = resource.meta();
    let Some(name) = meta.name.clone() else {
        return;
    };
    let namespace = meta.namespace.clone().unwrap_or_default();
    let annotations = meta.annotations.clone().unwrap_or_default();

    if is_ignored(&annotations) {
        debug!(kind = %kind, resource = %name, "resource is ignored");
        return;
    }

    let content_hash = hash(&resource);
    match hashes.insert(cache_key(resource.meta()), content_hash.clone()) {
        // First sighting primes the cache; creations do not trigger reloads.
        None => {}
        Some(previous) if previous == content_hash => {}
        Some(_) => {
            info!(kind = %kind, resource = %name, namespace = %namespace, "content change detected");
            let change = ChangeConfig {
                kind,
                resource_name: name,
                namespace,
                content_hash,
                resource_annotations: annotations,
            };
            if let Err(err) = engine.apply_change(change).await {
                error!(error = %err, "change processing failed, awaiting redelivery");
            }
        }
    }
}

fn is_ignored(annotations: &std::collections::BTreeMap<String, String>) -> bool {
    annotations.get(IGNORE_ANNOTATION).map(String::as_str) == Some("true")
}

fn cache_key(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}

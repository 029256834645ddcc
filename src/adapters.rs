//! # Resource Adapters
//!
//! One adapter per rollout-capable workload kind. Adapters own the
//! kind-specific API access: listing candidate workloads in a namespace and
//! writing a mutated item back. Listing failures degrade to an empty set;
//! the watch layer redelivers on the next relevant change, so there is
//! nothing useful to propagate. Update failures are surfaced to the caller.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::constants::CRONJOB_INSTANTIATE_ANNOTATION;
use crate::crds::{DeploymentConfig, Rollout};
use crate::options::Options;
use crate::workload::{WorkloadItem, WorkloadKind};

/// Failure to write an updated workload back to the API server.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to update {kind} '{name}' in namespace '{namespace}'")]
    Update {
        kind: WorkloadKind,
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },
    #[error("{kind} adapter received a {got} item")]
    KindMismatch { kind: WorkloadKind, got: WorkloadKind },
}

/// Capability set implemented once per workload kind. Item accessors live on
/// [`WorkloadItem`]; the adapter contributes the pieces that differ per kind.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Kind label used in logs, metrics, and batch identities.
    fn kind(&self) -> WorkloadKind;

    /// All workloads of this kind in the namespace. Never fails the caller:
    /// an API error is logged and yields an empty list.
    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem>;

    /// Write the mutated item back so the rollout machinery picks it up.
    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError>;
}

/// Adapter set for the active feature flags. Deployments, CronJobs,
/// DaemonSets, and StatefulSets are always watched; DeploymentConfigs and
/// Argo Rollouts only on clusters that opted in.
pub fn active_adapters(options: &Options) -> Vec<Arc<dyn ResourceAdapter>> {
    let mut adapters: Vec<Arc<dyn ResourceAdapter>> = vec![
        Arc::new(DeploymentAdapter),
        Arc::new(CronJobAdapter),
        Arc::new(DaemonSetAdapter),
        Arc::new(StatefulSetAdapter),
    ];
    if options.enable_openshift {
        adapters.push(Arc::new(DeploymentConfigAdapter));
    }
    if options.enable_argo_rollouts {
        adapters.push(Arc::new(RolloutAdapter));
    }
    adapters
}

async fn list_into<K, F>(
    client: &Client,
    namespace: &str,
    kind: WorkloadKind,
    wrap: F,
) -> Vec<WorkloadItem>
where
    K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
    F: Fn(K) -> WorkloadItem,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api.list(&ListParams::default()).await {
        Ok(list) => list.items.into_iter().map(wrap).collect(),
        Err(err) => {
            warn!(
                namespace,
                kind = %kind,
                error = %err,
                "listing workloads failed, treating as empty"
            );
            Vec::new()
        }
    }
}

async fn replace_item<K>(
    client: &Client,
    namespace: &str,
    kind: WorkloadKind,
    name: &str,
    object: &K,
) -> Result<(), UpdateError>
where
    K: kube::Resource<Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug,
    K::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.replace(name, &PostParams::default(), object)
        .await
        .map(|_| ())
        .map_err(|source| UpdateError::Update {
            kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
            source,
        })
}

#[derive(Debug)]
pub struct DeploymentAdapter;

#[async_trait]
impl ResourceAdapter for DeploymentAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Deployment
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<Deployment, _>(client, namespace, self.kind(), WorkloadItem::Deployment).await
    }

    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::Deployment(deployment) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        replace_item(client, namespace, self.kind(), item.name(), deployment).await
    }
}

#[derive(Debug)]
pub struct CronJobAdapter;

#[async_trait]
impl ResourceAdapter for CronJobAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::CronJob
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<CronJob, _>(client, namespace, self.kind(), WorkloadItem::CronJob).await
    }

    /// A CronJob has no running pods to roll, so the update creates a one-off
    /// Job from the (mutated) job template instead, owned by the CronJob.
    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::CronJob(cron_job) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        let name = item.name();
        let job = Job {
            metadata: ObjectMeta {
                generate_name: Some(format!("{name}-")),
                namespace: Some(namespace.to_string()),
                annotations: Some(BTreeMap::from([(
                    CRONJOB_INSTANTIATE_ANNOTATION.to_string(),
                    "manual".to_string(),
                )])),
                owner_references: Some(vec![OwnerReference {
                    api_version: "batch/v1".to_string(),
                    kind: "CronJob".to_string(),
                    name: name.to_string(),
                    uid: cron_job.metadata.uid.clone().unwrap_or_default(),
                    controller: Some(true),
                    block_owner_deletion: None,
                }]),
                ..Default::default()
            },
            spec: cron_job.spec.as_ref().and_then(|s| s.job_template.spec.clone()),
            ..Default::default()
        };
        let api: Api<Job> = Api::namespaced(client.clone(), namespace);
        api.create(&PostParams::default(), &job)
            .await
            .map(|_| ())
            .map_err(|source| UpdateError::Update {
                kind: self.kind(),
                name: name.to_string(),
                namespace: namespace.to_string(),
                source,
            })
    }
}

#[derive(Debug)]
pub struct DaemonSetAdapter;

#[async_trait]
impl ResourceAdapter for DaemonSetAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::DaemonSet
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<DaemonSet, _>(client, namespace, self.kind(), WorkloadItem::DaemonSet).await
    }

    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::DaemonSet(daemon_set) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        replace_item(client, namespace, self.kind(), item.name(), daemon_set).await
    }
}

#[derive(Debug)]
pub struct StatefulSetAdapter;

#[async_trait]
impl ResourceAdapter for StatefulSetAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::StatefulSet
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<StatefulSet, _>(client, namespace, self.kind(), WorkloadItem::StatefulSet).await
    }

    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::StatefulSet(stateful_set) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        replace_item(client, namespace, self.kind(), item.name(), stateful_set).await
    }
}

#[derive(Debug)]
pub struct DeploymentConfigAdapter;

#[async_trait]
impl ResourceAdapter for DeploymentConfigAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::DeploymentConfig
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<DeploymentConfig, _>(
            client,
            namespace,
            self.kind(),
            WorkloadItem::DeploymentConfig,
        )
        .await
    }

    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::DeploymentConfig(deployment_config) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        replace_item(client, namespace, self.kind(), item.name(), deployment_config).await
    }
}

#[derive(Debug)]
pub struct RolloutAdapter;

#[async_trait]
impl ResourceAdapter for RolloutAdapter {
    fn kind(&self) -> WorkloadKind {
        WorkloadKind::Rollout
    }

    async fn list_items(&self, client: &Client, namespace: &str) -> Vec<WorkloadItem> {
        list_into::<Rollout, _>(client, namespace, self.kind(), WorkloadItem::Rollout).await
    }

    async fn apply_update(
        &self,
        client: &Client,
        namespace: &str,
        item: &WorkloadItem,
    ) -> Result<(), UpdateError> {
        let WorkloadItem::Rollout(rollout) = item else {
            return Err(UpdateError::KindMismatch {
                kind: self.kind(),
                got: item.kind(),
            });
        };
        replace_item(client, namespace, self.kind(), item.name(), rollout).await
    }
}

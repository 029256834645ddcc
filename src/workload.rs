//! # Workload Items
//!
//! A [`WorkloadItem`] is one live workload object of any supported kind,
//! with uniform access to the pieces the reload engine cares about:
//! metadata annotations, pod-template annotations, containers, init
//! containers, and volumes. Mutations happen in memory on the item; the
//! matching [`crate::adapters::ResourceAdapter`] writes the mutated object
//! back to the API server.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{Container, ObjectReference, PodSpec, PodTemplateSpec, Volume};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

use crate::crds::{DeploymentConfig, Rollout};

/// The workload kinds the controller can roll.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    CronJob,
    DaemonSet,
    StatefulSet,
    DeploymentConfig,
    Rollout,
}

impl WorkloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::DeploymentConfig => "DeploymentConfig",
            WorkloadKind::Rollout => "Rollout",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One workload object. Held only for the duration of an evaluation pass,
/// except while queued in a delayed batch (where only its identity is kept).
#[derive(Clone, Debug)]
pub enum WorkloadItem {
    Deployment(Deployment),
    CronJob(CronJob),
    DaemonSet(DaemonSet),
    StatefulSet(StatefulSet),
    DeploymentConfig(DeploymentConfig),
    Rollout(Rollout),
}

impl WorkloadItem {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            WorkloadItem::Deployment(_) => WorkloadKind::Deployment,
            WorkloadItem::CronJob(_) => WorkloadKind::CronJob,
            WorkloadItem::DaemonSet(_) => WorkloadKind::DaemonSet,
            WorkloadItem::StatefulSet(_) => WorkloadKind::StatefulSet,
            WorkloadItem::DeploymentConfig(_) => WorkloadKind::DeploymentConfig,
            WorkloadItem::Rollout(_) => WorkloadKind::Rollout,
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            WorkloadItem::Deployment(d) => &d.metadata,
            WorkloadItem::CronJob(c) => &c.metadata,
            WorkloadItem::DaemonSet(d) => &d.metadata,
            WorkloadItem::StatefulSet(s) => &s.metadata,
            WorkloadItem::DeploymentConfig(dc) => &dc.metadata,
            WorkloadItem::Rollout(r) => &r.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    /// Annotations on the workload object itself.
    pub fn annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().annotations.as_ref()
    }

    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        match self {
            WorkloadItem::Deployment(d) => d.spec.as_ref().map(|s| &s.template),
            WorkloadItem::CronJob(c) => c
                .spec
                .as_ref()
                .and_then(|s| s.job_template.spec.as_ref())
                .map(|s| &s.template),
            WorkloadItem::DaemonSet(d) => d.spec.as_ref().map(|s| &s.template),
            WorkloadItem::StatefulSet(s) => s.spec.as_ref().map(|s| &s.template),
            WorkloadItem::DeploymentConfig(dc) => dc.spec.template.as_ref(),
            WorkloadItem::Rollout(r) => r.spec.template.as_ref(),
        }
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        match self {
            WorkloadItem::Deployment(d) => d.spec.as_mut().map(|s| &mut s.template),
            WorkloadItem::CronJob(c) => c
                .spec
                .as_mut()
                .and_then(|s| s.job_template.spec.as_mut())
                .map(|s| &mut s.template),
            WorkloadItem::DaemonSet(d) => d.spec.as_mut().map(|s| &mut s.template),
            WorkloadItem::StatefulSet(s) => s.spec.as_mut().map(|s| &mut s.template),
            WorkloadItem::DeploymentConfig(dc) => dc.spec.template.as_mut(),
            WorkloadItem::Rollout(r) => r.spec.template.as_mut(),
        }
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.pod_template().and_then(|t| t.spec.as_ref())
    }

    /// Annotations on the pod template.
    pub fn pod_annotations(&self) -> Option<&BTreeMap<String, String>> {
        self.pod_template()
            .and_then(|t| t.metadata.as_ref())
            .and_then(|m| m.annotations.as_ref())
    }

    /// Mutable pod-template annotations, created on demand. `None` when the
    /// workload carries no pod template at all (e.g. a Rollout using
    /// `workloadRef`).
    pub fn pod_annotations_mut(&mut self) -> Option<&mut BTreeMap<String, String>> {
        let template = self.pod_template_mut()?;
        Some(
            template
                .metadata
                .get_or_insert_with(Default::default)
                .annotations
                .get_or_insert_with(Default::default),
        )
    }

    pub fn containers(&self) -> &[Container] {
        self.pod_spec()
            .map(|s| s.containers.as_slice())
            .unwrap_or_default()
    }

    pub fn containers_mut(&mut self) -> Option<&mut Vec<Container>> {
        self.pod_template_mut()?
            .spec
            .as_mut()
            .map(|s| &mut s.containers)
    }

    pub fn init_containers(&self) -> &[Container] {
        self.pod_spec()
            .and_then(|s| s.init_containers.as_deref())
            .unwrap_or_default()
    }

    pub fn volumes(&self) -> &[Volume] {
        self.pod_spec()
            .and_then(|s| s.volumes.as_deref())
            .unwrap_or_default()
    }

    /// Reference for attaching Kubernetes Events to this workload.
    pub fn object_ref(&self) -> ObjectReference {
        match self {
            WorkloadItem::Deployment(d) => d.object_ref(&()),
            WorkloadItem::CronJob(c) => c.object_ref(&()),
            WorkloadItem::DaemonSet(d) => d.object_ref(&()),
            WorkloadItem::StatefulSet(s) => s.object_ref(&()),
            WorkloadItem::DeploymentConfig(dc) => dc.object_ref(&()),
            WorkloadItem::Rollout(r) => r.object_ref(&()),
        }
    }
}

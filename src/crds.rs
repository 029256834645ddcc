//! # Custom Workload Types
//!
//! Typed clients for the two rollout-capable kinds that are not part of
//! `k8s-openapi`: OpenShift `DeploymentConfig` and Argo `Rollout`. Both are
//! declared with the `kube` derive and model only the pod template the
//! reload engine reads and mutates; every other spec field round-trips
//! untouched through the flattened passthrough map so an update never drops
//! configuration this controller does not know about.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// OpenShift `apps.openshift.io/v1` DeploymentConfig. Only watched when the
/// OpenShift adapter set is enabled.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize)]
#[kube(
    group = "apps.openshift.io",
    version = "v1",
    kind = "DeploymentConfig",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, serde_json::Value>,
}

/// Argo `argoproj.io/v1alpha1` Rollout. Rollouts using `workloadRef` have no
/// inline template; those are skipped by the usage scanner because the
/// template accessor returns nothing.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "Rollout",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    #[serde(flatten)]
    pub passthrough: BTreeMap<String, serde_json::Value>,
}

//! # Workload Reloader
//!
//! A Kubernetes controller that watches ConfigMaps and Secrets and performs
//! rolling restarts of the workloads consuming them.
//!
//! ## Overview
//!
//! 1. **Watching resources** - Watcher streams over ConfigMaps and Secrets
//!    detect content changes via stable SHA-256 hashes
//! 2. **Trigger evaluation** - Per-workload annotations (auto, typed auto,
//!    manual pattern lists, search/match, exclusion lists) decide whether a
//!    change reloads a workload
//! 3. **Usage scanning** - Volume mounts, projected volumes, env refs, and
//!    `envFrom` locate the container that consumes the changed resource
//! 4. **Reload strategies** - A pod-template annotation stamp or an injected
//!    content-hash env var forces the rollout
//! 5. **Delayed upgrades** - Workloads can coalesce bursts of changes into a
//!    single rollout through a per-workload debounce window
//!
//! ## Supported workload kinds
//!
//! Deployments, CronJobs (rolled by creating a one-off Job), DaemonSets,
//! StatefulSets, and - behind feature flags - OpenShift DeploymentConfigs
//! and Argo Rollouts.
//!
//! ## Usage
//!
//! See the [README.md](../README.md) for annotation reference and examples.

pub mod adapters;
pub mod change;
pub mod constants;
pub mod crds;
pub mod delayed;
pub mod hashing;
pub mod observability;
pub mod options;
pub mod reload;
pub mod server;
pub mod strategy;
pub mod usage;
pub mod watch;
pub mod workload;

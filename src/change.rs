//! # Change Events
//!
//! Normalized description of a detected ConfigMap/Secret content change,
//! handed from the watch layer to the reload engine.

use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{
    CONFIGMAP_AUTO_ANNOTATION, CONFIGMAP_ENV_VAR_POSTFIX, CONFIGMAP_EXCLUDE_ANNOTATION,
    CONFIGMAP_RELOAD_ANNOTATION, SECRET_AUTO_ANNOTATION, SECRET_ENV_VAR_POSTFIX,
    SECRET_EXCLUDE_ANNOTATION, SECRET_RELOAD_ANNOTATION,
};

/// Kind of resource a change originated from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    ConfigMap,
    Secret,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::ConfigMap => "ConfigMap",
            SourceKind::Secret => "Secret",
        }
    }

    /// Manual reload annotation key for this kind.
    pub fn reload_annotation(self) -> &'static str {
        match self {
            SourceKind::ConfigMap => CONFIGMAP_RELOAD_ANNOTATION,
            SourceKind::Secret => SECRET_RELOAD_ANNOTATION,
        }
    }

    /// Kind-specific auto-reload annotation key.
    pub fn typed_auto_annotation(self) -> &'static str {
        match self {
            SourceKind::ConfigMap => CONFIGMAP_AUTO_ANNOTATION,
            SourceKind::Secret => SECRET_AUTO_ANNOTATION,
        }
    }

    /// Kind-specific exclusion-list annotation key.
    pub fn exclude_annotation(self) -> &'static str {
        match self {
            SourceKind::ConfigMap => CONFIGMAP_EXCLUDE_ANNOTATION,
            SourceKind::Secret => SECRET_EXCLUDE_ANNOTATION,
        }
    }

    /// Suffix appended to env-var names injected for this kind.
    pub fn env_var_postfix(self) -> &'static str {
        match self {
            SourceKind::ConfigMap => CONFIGMAP_ENV_VAR_POSTFIX,
            SourceKind::Secret => SECRET_ENV_VAR_POSTFIX,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected ConfigMap/Secret content change. Immutable once constructed;
/// the watch layer builds one per change and the reload engine evaluates it
/// against every candidate workload.
#[derive(Clone, Debug)]
pub struct ChangeConfig {
    pub kind: SourceKind,
    pub resource_name: String,
    pub namespace: String,
    /// Stable digest of the resource's current data.
    pub content_hash: String,
    /// Annotations on the ConfigMap/Secret itself, used for search matching.
    pub resource_annotations: BTreeMap<String, String>,
}

//! # Cluster Access
//!
//! The diagnostics never talk to the API server directly. They go through
//! [`ClusterClient`], which returns plain snapshots of the objects they need
//! and classifies every failure as a [`ClientError`]. [`KubeClusterClient`]
//! is the implementation backed by `kube`.

pub mod kube_client;

pub use kube_client::KubeClusterClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ClientError;
use crate::logscan::LogStream;

/// Workload resource whose pods are inspected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    /// Label selector matching the workload's pods
    pub selector: BTreeMap<String, String>,
}

impl Workload {
    /// Selector rendered as `key=value,key=value`
    #[must_use]
    pub fn label_selector(&self) -> String {
        self.selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Lifecycle phase of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl PodPhase {
    /// Parse the `status.phase` string reported by the API server
    #[must_use]
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Simplified Pod representation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    /// Container names in spec order
    pub containers: Vec<String>,
}

impl PodInfo {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running
    }

    #[must_use]
    pub fn first_container(&self) -> Option<&str> {
        self.containers.first().map(String::as_str)
    }
}

/// Service resource checked for existence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
}

/// The request an access review asks about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAttributes {
    pub namespace: String,
    pub verb: String,
    /// API group; empty for the core group
    pub group: String,
    pub resource: String,
    pub name: String,
}

impl AccessAttributes {
    pub fn new(
        namespace: impl Into<String>,
        verb: impl Into<String>,
        group: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            verb: verb.into(),
            group: group.into(),
            resource: resource.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AccessAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource = if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        };
        write!(f, "{} {}/{} in {}", self.verb, resource, self.name, self.namespace)
    }
}

/// Read access to the cluster used by the diagnostics
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a workload by name
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Workload, ClientError>;

    /// Fetch a service by name
    async fn get_service(&self, namespace: &str, name: &str) -> Result<ServiceInfo, ClientError>;

    /// List pods matching a `key=value,...` label selector
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, ClientError>;

    /// Open a non-following log stream for one container of a pod
    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, ClientError>;

    /// Whether the acting identity may perform the described request
    async fn can_i(&self, attributes: &AccessAttributes) -> Result<bool, ClientError>;
}

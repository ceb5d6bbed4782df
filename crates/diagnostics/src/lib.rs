//! # Cluster Diagnostics
//!
//! Pluggable health checks for a running cluster. Each [`Diagnostic`]
//! inspects one aspect of cluster state and reports [`Finding`]s at graded
//! severity into a [`DiagnosticResult`].
//!
//! ## Architecture
//!
//! - **Results** (`result.rs`): append-only findings with stable codes and
//!   named-parameter message templates
//! - **Contract** (`diagnostic.rs`): the `Diagnostic` trait with its
//!   precondition gate
//! - **Cluster access** (`cluster/`): the `ClusterClient` seam and its
//!   `kube` implementation
//! - **Log scanning** (`logscan.rs`): lazy line reader over pod logs
//! - **Checks** (`checks/`): node config, service existence and the
//!   cluster router check
//! - **Runner** (`runner.rs`): gating and aggregation across diagnostics
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use diagnostics::{run_diagnostics, ClusterRouter, Diagnostic, KubeClusterClient};
//!
//! # async fn example() -> Result<(), diagnostics::ClientError> {
//! let client = Arc::new(KubeClusterClient::try_default().await?);
//! let checks: Vec<Arc<dyn Diagnostic>> = vec![Arc::new(ClusterRouter::default().with_client(client))];
//!
//! let report = run_diagnostics(&checks).await;
//! println!("healthy: {}", report.is_healthy());
//! # Ok(())
//! # }
//! ```

pub mod checks;
pub mod cluster;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod logscan;
pub mod result;
pub mod runner;

pub use checks::{ClusterRouter, NodeConfigCheck, ServiceExistsCheck, YamlNodeConfigLoader};
pub use cluster::{
    AccessAttributes, ClusterClient, KubeClusterClient, PodInfo, PodPhase, ServiceInfo, Workload,
};
pub use config::RouterCheckSettings;
pub use diagnostic::Diagnostic;
pub use error::{ClientError, ConfigError, DiagnosticError, ValidationError};
pub use logscan::{LineScanner, LogStream};
pub use result::{DiagnosticResult, Finding, Level, Message};
pub use runner::{run_diagnostics, DiagnosticReport, Outcome};

//! Built-in diagnostics.

pub mod node_config;
pub mod router;
pub mod service;

pub use node_config::{
    NodeConfig, NodeConfigCheck, NodeConfigLoader, PodManifestConfig, ServingInfo,
    YamlNodeConfigLoader, NODE_CONFIG_CHECK_NAME,
};
pub use router::{ClusterRouter, FailureMatch, CLUSTER_ROUTER_NAME};
pub use service::{ServiceExistsCheck, SERVICE_EXISTS_NAME};

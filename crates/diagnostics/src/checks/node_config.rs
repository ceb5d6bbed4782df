//! Node config file diagnostic and the YAML loader it uses by default.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostic::Diagnostic;
use crate::error::{ConfigError, DiagnosticError, ValidationError};
use crate::result::{DiagnosticResult, Message};

pub const NODE_CONFIG_CHECK_NAME: &str = "NodeConfigCheck";

/// Node configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub node_name: String,
    /// Kubeconfig used to reach the master
    #[serde(default)]
    pub master_kube_config: String,
    #[serde(default)]
    pub serving_info: ServingInfo,
    #[serde(rename = "dnsIP", default)]
    pub dns_ip: Option<String>,
    #[serde(default)]
    pub pod_manifest_config: Option<PodManifestConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingInfo {
    /// `host:port` the node listens on
    #[serde(default)]
    pub bind_address: String,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodManifestConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file_check_interval_seconds: i64,
}

/// Reads and validates node config files
pub trait NodeConfigLoader: Send + Sync {
    /// Parse the file and resolve relative file references against its directory
    fn read_and_resolve(&self, path: &Path) -> Result<NodeConfig, ConfigError>;

    /// Structural validation; an empty list means the config is valid
    fn validate(&self, config: &NodeConfig) -> Vec<ValidationError>;
}

/// Loader for YAML node config files
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlNodeConfigLoader;

impl NodeConfigLoader for YamlNodeConfigLoader {
    fn read_and_resolve(&self, path: &Path) -> Result<NodeConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: NodeConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        resolve(base, &mut config.master_kube_config);
        if let Some(cert) = config.serving_info.cert_file.as_mut() {
            resolve(base, cert);
        }
        if let Some(key) = config.serving_info.key_file.as_mut() {
            resolve(base, key);
        }
        if let Some(manifests) = config.pod_manifest_config.as_mut() {
            resolve(base, &mut manifests.path);
        }
        Ok(config)
    }

    fn validate(&self, config: &NodeConfig) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if config.node_name.trim().is_empty() {
            errors.push(ValidationError::new("nodeName", "is required"));
        }
        if config.master_kube_config.is_empty() {
            errors.push(ValidationError::new("masterKubeConfig", "is required"));
        }

        let serving = &config.serving_info;
        if serving.bind_address.is_empty() {
            errors.push(ValidationError::new("servingInfo.bindAddress", "is required"));
        } else if serving.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "servingInfo.bindAddress",
                format!("\"{}\" is not a valid ip:port", serving.bind_address),
            ));
        }
        match (&serving.cert_file, &serving.key_file) {
            (Some(_), None) => errors.push(ValidationError::new(
                "servingInfo.keyFile",
                "is required when certFile is set",
            )),
            (None, Some(_)) => errors.push(ValidationError::new(
                "servingInfo.certFile",
                "is required when keyFile is set",
            )),
            _ => {}
        }

        if let Some(dns_ip) = &config.dns_ip {
            if dns_ip.parse::<IpAddr>().is_err() {
                errors.push(ValidationError::new(
                    "dnsIP",
                    format!("\"{dns_ip}\" is not a valid IP address"),
                ));
            }
        }

        if let Some(manifests) = &config.pod_manifest_config {
            if manifests.path.is_empty() {
                errors.push(ValidationError::new("podManifestConfig.path", "is required"));
            }
            if manifests.file_check_interval_seconds < 1 {
                errors.push(ValidationError::new(
                    "podManifestConfig.fileCheckIntervalSeconds",
                    "must be at least 1",
                ));
            }
        }

        errors
    }
}

fn resolve(base: &Path, file: &mut String) {
    if file.is_empty() || Path::new(file.as_str()).is_absolute() {
        return;
    }
    *file = base.join(file.as_str()).display().to_string();
}

/// Diagnostic checking that the node config file exists and is valid
pub struct NodeConfigCheck {
    path: PathBuf,
    loader: Arc<dyn NodeConfigLoader>,
}

impl NodeConfigCheck {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loader: Arc::new(YamlNodeConfigLoader),
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn NodeConfigLoader>) -> Self {
        self.loader = loader;
        self
    }
}

#[async_trait]
impl Diagnostic for NodeConfigCheck {
    fn name(&self) -> &str {
        NODE_CONFIG_CHECK_NAME
    }

    fn description(&self) -> &str {
        "Check the node config file"
    }

    async fn can_run(&self) -> Result<(), DiagnosticError> {
        if self.path.as_os_str().is_empty() {
            return Err(DiagnosticError::new(
                "noNodeConfigFile",
                "must have node config file",
            ));
        }
        Ok(())
    }

    async fn check(&self) -> DiagnosticResult {
        let mut r = DiagnosticResult::new(NODE_CONFIG_CHECK_NAME);
        let path = self.path.display();

        r.debug(Message::text(
            "DH1001",
            format!("Looking for node config file at '{path}'"),
        ));
        let config = match self.loader.read_and_resolve(&self.path) {
            Ok(config) => config,
            Err(err) => {
                r.error(
                    Message::text(
                        "DH1002",
                        format!("Could not read node config file '{path}':\n{err}"),
                    )
                    .cause(err),
                );
                return r;
            }
        };

        r.info(Message::text(
            "DH1003",
            format!("Found a node config file: {path}"),
        ));

        for err in self.loader.validate(&config) {
            r.error(
                Message::text(
                    "DH1004",
                    format!("Validation of node config file '{path}' failed:\n{err}"),
                )
                .cause(err),
            );
        }
        r
    }
}

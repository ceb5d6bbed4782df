use async_trait::async_trait;
use std::sync::Arc;

use crate::cluster::{AccessAttributes, ClusterClient};
use crate::diagnostic::Diagnostic;
use crate::error::DiagnosticError;
use crate::result::{DiagnosticResult, Message};

pub const SERVICE_EXISTS_NAME: &str = "ServiceExists";

/// Diagnostic checking that a named service exists
pub struct ServiceExistsCheck {
    client: Option<Arc<dyn ClusterClient>>,
    namespace: String,
    service: String,
}

impl ServiceExistsCheck {
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            client: None,
            namespace: namespace.into(),
            service: service.into(),
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client = Some(client);
        self
    }
}

#[async_trait]
impl Diagnostic for ServiceExistsCheck {
    fn name(&self) -> &str {
        SERVICE_EXISTS_NAME
    }

    fn description(&self) -> &str {
        "Check that a required service exists"
    }

    async fn can_run(&self) -> Result<(), DiagnosticError> {
        if self.service.is_empty() || self.namespace.is_empty() {
            return Err(DiagnosticError::new(
                "clNoServiceName",
                "must have a service name and namespace",
            ));
        }
        let Some(client) = self.client.as_deref() else {
            return Err(DiagnosticError::new(
                "clServiceNoClient",
                "must have a cluster client",
            ));
        };

        let attributes =
            AccessAttributes::new(&self.namespace, "get", "", "services", &self.service);
        match client.can_i(&attributes).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DiagnosticError::new(
                "clGetServiceFailed",
                format!("Client is not allowed to {attributes}"),
            )),
            Err(err) => Err(DiagnosticError::new(
                "clGetServiceFailed",
                format!("Client error while checking access to {attributes}: {err}"),
            )
            .with_cause(err)),
        }
    }

    async fn check(&self) -> DiagnosticResult {
        let mut r = DiagnosticResult::new(SERVICE_EXISTS_NAME);
        let Some(client) = self.client.as_deref() else {
            r.error(Message::text(
                "DClu1000",
                "No cluster client configured, so the service cannot be checked",
            ));
            return r;
        };

        match client.get_service(&self.namespace, &self.service).await {
            Ok(service) => r.debug(Message::text(
                "DClu1001",
                format!(
                    "Found service \"{}\" in namespace \"{}\" (cluster IP {})",
                    service.name,
                    service.namespace,
                    service.cluster_ip.as_deref().unwrap_or("none")
                ),
            )),
            Err(err) if err.is_not_found() => r.warn(
                Message::text(
                    "DClu1002",
                    format!(
                        "There is no \"{}\" service in namespace \"{}\". It may have been \
                         named something different, in which case this warning may be ignored.",
                        self.service, self.namespace
                    ),
                )
                .cause(err),
            ),
            Err(err) => r.error(
                Message::text(
                    "DClu1003",
                    format!(
                        "Client error while retrieving the \"{}\" service: {err}",
                        self.service
                    ),
                )
                .cause(err),
            ),
        }
        r
    }
}

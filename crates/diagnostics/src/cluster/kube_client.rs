//! [`ClusterClient`] backed by a `kube` client.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::{Api, ListParams, LogParams, PostParams};
use kube::Client;
use tracing::debug;

use super::{AccessAttributes, ClusterClient, PodInfo, PodPhase, ServiceInfo, Workload};
use crate::error::ClientError;
use crate::logscan::LogStream;

/// Cluster access through the Kubernetes API server.
///
/// Workloads are `apps/v1` Deployments; only `matchLabels` of the
/// deployment selector is used to find member pods.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the in-cluster or kubeconfig defaults
    pub async fn try_default() -> Result<Self, ClientError> {
        let client = Client::try_default()
            .await
            .map_err(|e| classify(e, "client", "default"))?;
        Ok(Self::new(client))
    }
}

/// Map a `kube` error onto the client error kinds by HTTP status
pub(crate) fn classify(err: kube::Error, kind: &str, name: &str) -> ClientError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClientError::not_found(kind, name),
        kube::Error::Api(ae) if ae.code == 401 || ae.code == 403 => {
            ClientError::Forbidden(ae.message)
        }
        kube::Error::Api(ae) if ae.code == 429 || ae.code >= 500 => {
            ClientError::Transient(format!("{} ({})", ae.message, ae.code))
        }
        kube::Error::Api(ae) => ClientError::Other(format!("{} ({})", ae.message, ae.code)),
        e @ (kube::Error::HyperError(_) | kube::Error::Service(_)) => {
            ClientError::Transient(e.to_string())
        }
        other => ClientError::Other(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Workload, ClientError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = deployments
            .get(name)
            .await
            .map_err(|e| classify(e, "deployment", name))?;

        let selector = deployment
            .spec
            .and_then(|spec| spec.selector.match_labels)
            .unwrap_or_default();

        Ok(Workload {
            name: name.to_string(),
            namespace: namespace.to_string(),
            selector,
        })
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<ServiceInfo, ClientError> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services
            .get(name)
            .await
            .map_err(|e| classify(e, "service", name))?;

        Ok(ServiceInfo {
            name: name.to_string(),
            namespace: namespace.to_string(),
            cluster_ip: service.spec.and_then(|spec| spec.cluster_ip),
        })
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(label_selector);
        let pod_list = pods
            .list(&lp)
            .await
            .map_err(|e| classify(e, "pods", label_selector))?;

        debug!(namespace = %namespace, selector = %label_selector, count = pod_list.items.len(), "Listed pods");

        Ok(pod_list
            .into_iter()
            .map(|pod| {
                let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
                PodInfo {
                    name: pod.metadata.name.clone().unwrap_or_default(),
                    namespace: pod
                        .metadata
                        .namespace
                        .clone()
                        .unwrap_or_else(|| namespace.to_string()),
                    phase: PodPhase::from_status(phase),
                    containers: pod
                        .spec
                        .as_ref()
                        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = LogParams {
            container: Some(container.to_string()),
            follow: false,
            ..LogParams::default()
        };
        let reader = pods
            .log_stream(pod, &lp)
            .await
            .map_err(|e| classify(e, "pod log", pod))?;

        Ok(Box::pin(reader))
    }

    async fn can_i(&self, attributes: &AccessAttributes) -> Result<bool, ClientError> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    namespace: Some(attributes.namespace.clone()),
                    verb: Some(attributes.verb.clone()),
                    group: Some(attributes.group.clone()),
                    resource: Some(attributes.resource.clone()),
                    name: Some(attributes.name.clone()),
                    ..ResourceAttributes::default()
                }),
                ..SelfSubjectAccessReviewSpec::default()
            },
            ..SelfSubjectAccessReview::default()
        };

        let reviews: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let response = reviews
            .create(&PostParams::default(), &review)
            .await
            .map_err(|e| classify(e, "selfsubjectaccessreview", &attributes.name))?;

        let allowed = response.status.is_some_and(|s| s.allowed);
        debug!(request = %attributes, allowed, "Access review completed");
        Ok(allowed)
    }
}

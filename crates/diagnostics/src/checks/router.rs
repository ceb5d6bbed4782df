//! # Cluster Router Diagnostic
//!
//! Verifies there is a working router:
//!
//! 1. the router deployment exists in its namespace,
//! 2. it has at least one running pod,
//! 3. no running pod logged a route list failure recently.
//!
//! Each stage records its findings and a failed stage ends the check (or,
//! for log scanning, the work on that pod). Route list failures older than
//! the recency window are ignored: the router retries every second, so an
//! old failure in the log has most likely cleared since.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::io;
use std::sync::Arc;
use tracing::debug;

use crate::cluster::{AccessAttributes, ClusterClient, PodInfo, Workload};
use crate::config::{RouterCheckSettings, DEFAULT_FAILURE_PATTERN};
use crate::diagnostic::Diagnostic;
use crate::error::{ClientError, ConfigError, DiagnosticError};
use crate::logscan::LineScanner;
use crate::result::{DiagnosticResult, Message};

pub const CLUSTER_ROUTER_NAME: &str = "ClusterRouter";

lazy_static! {
    static ref DEFAULT_PATTERN: Regex = Regex::new(DEFAULT_FAILURE_PATTERN).unwrap();
}

const NO_ROUTER_DEPLOYMENT: &str = "\
There is no \"{{name}}\" deployment in namespace \"{{namespace}}\". The router may
have been named something different, in which case this warning may be ignored.

A router is not strictly required; however it is needed for reaching pods from
external networks and its absence likely indicates an incomplete installation.";

const ROUTER_LOOKUP_FAILED: &str = "\
Client error while retrieving the \"{{name}}\" deployment. This is likely a
transient error; try running diagnostics again. If this message persists there
may be a permissions problem with reading deployments. The error was:

{{error}}";

const ROUTER_NO_PODS: &str = "\
The \"{{name}}\" deployment exists but has no running pods, so it is not
available. Apps will not be externally accessible via the router.";

const POD_LOG_FAILED: &str = "\
Failed to read the logs for the \"{{podName}}\" pod belonging to the router
deployment. This is not a problem by itself but prevents diagnostics from
looking for errors in those logs. The error encountered was:
{{error}}";

const POD_ROUTE_FAILURE: &str = "\
Recent pod logs for the \"{{podName}}\" pod belonging to the router deployment
show a failure requesting route information from the master. This prevents
the router from functioning, so applications will not be externally
accessible via the router.

There are many reasons for this request to fail, including invalid
credentials, DNS failures and master outages. Examine the following error
from the router pod logs to determine the cause:

{{reason}}
Time: {{timestamp}}";

/// A log line showing the route list failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMatch {
    /// Timestamp text as it appeared in the log
    pub timestamp: String,
    pub reason: String,
    pub logged_at: DateTime<Utc>,
}

enum ScanOutcome {
    Active(FailureMatch),
    Clean,
    ReadError(io::Error),
    TimedOut,
}

/// Diagnostic checking that the cluster router deployment is healthy
pub struct ClusterRouter {
    client: Option<Arc<dyn ClusterClient>>,
    settings: RouterCheckSettings,
    pattern: Regex,
}

impl Default for ClusterRouter {
    fn default() -> Self {
        Self {
            client: None,
            settings: RouterCheckSettings::default(),
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl ClusterRouter {
    /// Router check with custom settings, validated up front
    pub fn new(settings: RouterCheckSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let pattern = Regex::new(&settings.failure_pattern)?;
        Ok(Self {
            client: None,
            settings,
            pattern,
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client = Some(client);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &RouterCheckSettings {
        &self.settings
    }

    /// Match one log line against the failure signature.
    ///
    /// Returns the match only when its timestamp parses and is younger than
    /// the recency window relative to `now`. Timestamps ahead of `now` count
    /// as recent.
    #[must_use]
    pub fn match_failure(&self, line: &str, now: DateTime<Utc>) -> Option<FailureMatch> {
        let caps = self.pattern.captures(line)?;
        let timestamp = caps.get(1)?.as_str();
        let reason = caps.get(2).map_or("", |m| m.as_str());

        let logged_at = NaiveDateTime::parse_from_str(timestamp, &self.settings.timestamp_layout)
            .ok()?
            .and_utc();

        let recent = match (now - logged_at).to_std() {
            Ok(elapsed) => elapsed < self.settings.recency_window(),
            Err(_) => true,
        };
        if !recent {
            debug!(timestamp, "Ignoring stale route list failure");
            return None;
        }

        Some(FailureMatch {
            timestamp: timestamp.to_string(),
            reason: reason.to_string(),
            logged_at,
        })
    }

    fn access_attributes(&self) -> AccessAttributes {
        AccessAttributes::new(
            &self.settings.namespace,
            "get",
            "apps",
            "deployments",
            &self.settings.workload_name,
        )
    }

    async fn get_router_workload(
        &self,
        client: &dyn ClusterClient,
        r: &mut DiagnosticResult,
    ) -> Option<Workload> {
        let name = &self.settings.workload_name;
        let namespace = &self.settings.namespace;

        match client.get_workload(namespace, name).await {
            Ok(workload) => {
                r.debug(Message::text(
                    "DClu2003",
                    format!("Found default router deployment \"{name}\""),
                ));
                Some(workload)
            }
            Err(err) if err.is_not_found() => {
                r.warn(
                    Message::template("DClu2001", NO_ROUTER_DEPLOYMENT)
                        .param("name", name)
                        .param("namespace", namespace)
                        .cause(err),
                );
                None
            }
            Err(err) => {
                r.error(
                    Message::template("DClu2002", ROUTER_LOOKUP_FAILED)
                        .param("name", name)
                        .param("error", err.to_string())
                        .cause(err),
                );
                None
            }
        }
    }

    async fn get_router_pods(
        &self,
        client: &dyn ClusterClient,
        workload: &Workload,
        r: &mut DiagnosticResult,
    ) -> Option<Vec<PodInfo>> {
        let selector = workload.label_selector();
        let pods = match client.list_pods(&workload.namespace, &selector).await {
            Ok(pods) => pods,
            Err(err) => {
                r.error(
                    Message::text(
                        "DClu2004",
                        format!(
                            "Finding pods for the \"{}\" deployment failed. This should never happen. Error: {err}",
                            workload.name
                        ),
                    )
                    .cause(err),
                );
                return None;
            }
        };

        let mut running = Vec::with_capacity(pods.len());
        for pod in pods {
            if pod.is_running() {
                r.debug(Message::text(
                    "DClu2006",
                    format!("Found running router pod with name {}", pod.name),
                ));
                running.push(pod);
            } else {
                r.debug(Message::text(
                    "DClu2005",
                    format!(
                        "Router pod with name {} is not running (phase {})",
                        pod.name, pod.phase
                    ),
                ));
            }
        }

        if running.is_empty() {
            r.error(Message::template("DClu2007", ROUTER_NO_PODS).param("name", &workload.name));
            return None;
        }
        Some(running)
    }

    async fn check_router_logs(
        &self,
        client: &dyn ClusterClient,
        pod: &PodInfo,
        r: &mut DiagnosticResult,
    ) {
        let opened = match pod.first_container() {
            Some(container) => {
                client
                    .open_log_stream(&pod.namespace, &pod.name, container)
                    .await
            }
            None => Err(ClientError::Other(format!(
                "pod {} has no containers",
                pod.name
            ))),
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                r.warn(
                    Message::template("DClu2008", POD_LOG_FAILED)
                        .param("podName", &pod.name)
                        .param("error", err.to_string())
                        .cause(err),
                );
                return;
            }
        };

        let mut scanner = LineScanner::new(stream);
        let scan = self.scan_for_failure(&mut scanner);
        let outcome = match self.settings.log_scan_timeout() {
            Some(limit) => tokio::time::timeout(limit, scan)
                .await
                .unwrap_or(ScanOutcome::TimedOut),
            None => scan.await,
        };
        debug!(pod = %pod.name, lines = scanner.lines_read(), "Finished scanning router pod log");
        scanner.close();

        match outcome {
            ScanOutcome::Active(found) => {
                r.error(
                    Message::template("DClu2009", POD_ROUTE_FAILURE)
                        .param("reason", found.reason)
                        .param("timestamp", found.timestamp)
                        .param("podName", &pod.name),
                );
            }
            ScanOutcome::Clean => {}
            ScanOutcome::ReadError(err) => {
                r.debug(
                    Message::text(
                        "DClu2010",
                        format!(
                            "Reading the log of router pod {} stopped early: {err}",
                            pod.name
                        ),
                    )
                    .cause(err),
                );
            }
            ScanOutcome::TimedOut => {
                r.warn(Message::text(
                    "DClu2011",
                    format!(
                        "Scanning the log of router pod {} did not finish within {}ms",
                        pod.name,
                        self.settings.log_scan_timeout_ms.unwrap_or_default()
                    ),
                ));
            }
        }
    }

    async fn scan_for_failure(&self, scanner: &mut LineScanner) -> ScanOutcome {
        loop {
            match scanner.next_line().await {
                Ok(Some(line)) => {
                    if let Some(found) = self.match_failure(&line, Utc::now()) {
                        return ScanOutcome::Active(found);
                    }
                }
                Ok(None) => return ScanOutcome::Clean,
                Err(err) => return ScanOutcome::ReadError(err),
            }
        }
    }
}

#[async_trait]
impl Diagnostic for ClusterRouter {
    fn name(&self) -> &str {
        CLUSTER_ROUTER_NAME
    }

    fn description(&self) -> &str {
        "Check there is a working router"
    }

    async fn can_run(&self) -> Result<(), DiagnosticError> {
        let Some(client) = self.client.as_deref() else {
            return Err(DiagnosticError::new(
                "clRouterNoClient",
                "must have a cluster client",
            ));
        };

        let attributes = self.access_attributes();
        match client.can_i(&attributes).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DiagnosticError::new(
                "clGetRouterFailed",
                format!("Client is not allowed to {attributes}"),
            )),
            Err(err) => Err(DiagnosticError::new(
                "clGetRouterFailed",
                format!(
                    "Client error while checking access to router records ({attributes}). \
                     This is likely a transient error; try running diagnostics again. \
                     The error was: {err}"
                ),
            )
            .with_cause(err)),
        }
    }

    async fn check(&self) -> DiagnosticResult {
        let mut r = DiagnosticResult::new(CLUSTER_ROUTER_NAME);
        let Some(client) = self.client.as_deref() else {
            r.error(Message::text(
                "DClu2000",
                "No cluster client configured, so the router cannot be checked",
            ));
            return r;
        };

        if let Some(workload) = self.get_router_workload(client, &mut r).await {
            if let Some(pods) = self.get_router_pods(client, &workload, &mut r).await {
                for pod in &pods {
                    self.check_router_logs(client, pod, &mut r).await;
                }
            }
        }
        r
    }
}

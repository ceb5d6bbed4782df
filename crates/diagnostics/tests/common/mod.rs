//! Shared fixtures: an in-memory cluster whose log streams report when they
//! are released.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use futures::io::{AsyncBufRead, AsyncRead};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use diagnostics::{
    AccessAttributes, ClientError, ClusterClient, Level, LogStream, PodInfo, PodPhase,
    ServiceInfo, Workload,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log timestamp `secs` seconds before now, in the router's layout
pub fn stamp_ago(secs: i64) -> String {
    (Utc::now() - TimeDelta::seconds(secs))
        .format("%Y-%m-%dT%H:%M:%S.%9fZ")
        .to_string()
}

pub fn failure_line(timestamp: &str, reason: &str) -> String {
    format!("{timestamp} 1 reflector.go:133] Failed to list *api.Route: {reason}")
}

pub fn info_line(timestamp: &str) -> String {
    format!("{timestamp} 1 router.go:212] Router reloaded")
}

pub fn pod(name: &str, phase: PodPhase) -> PodInfo {
    PodInfo {
        name: name.to_string(),
        namespace: "default".to_string(),
        phase,
        containers: vec!["router".to_string()],
    }
}

pub fn running_pod(name: &str) -> PodInfo {
    pod(name, PodPhase::Running)
}

pub fn router_workload() -> Workload {
    Workload {
        name: "router".to_string(),
        namespace: "default".to_string(),
        selector: BTreeMap::from([("router".to_string(), "router".to_string())]),
    }
}

/// Scripted log output for one pod
#[derive(Debug, Clone)]
pub enum FakeLog {
    Lines(Vec<String>),
    OpenError(ClientError),
    /// Lines followed by a read error
    ReadError(Vec<String>),
    /// Lines after which the stream never ends
    Hang(Vec<String>),
}

/// Reader wrapper counting how often it is dropped
struct Tracked<R> {
    inner: R,
    pub released: Arc<AtomicUsize>,
}

impl<R> Drop for Tracked<R> {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Tracked<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<R: AsyncBufRead + Unpin> AsyncBufRead for Tracked<R> {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Pin::new(&mut self.get_mut().inner).poll_fill_buf(cx)
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.get_mut().inner).consume(amt);
    }
}

pub struct FakeCluster {
    pub access: Result<bool, ClientError>,
    pub workload: Result<Workload, ClientError>,
    pub service: Result<ServiceInfo, ClientError>,
    pub pods: Result<Vec<PodInfo>, ClientError>,
    pub logs: HashMap<String, FakeLog>,
    pub calls: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub lines_pulled: Arc<AtomicUsize>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            access: Ok(true),
            workload: Ok(router_workload()),
            service: Ok(ServiceInfo {
                name: "docker-registry".to_string(),
                namespace: "default".to_string(),
                cluster_ip: Some("172.30.0.10".to_string()),
            }),
            pods: Ok(Vec::new()),
            logs: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            lines_pulled: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakeCluster {
    /// Router deployment with the given running pods and their logs
    pub fn with_router_logs(logs: Vec<(&str, FakeLog)>) -> Self {
        Self {
            pods: Ok(logs.iter().map(|(name, _)| running_pod(name)).collect()),
            logs: logs
                .into_iter()
                .map(|(name, log)| (name.to_string(), log))
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    /// Streams successfully handed out
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Log lines the check pulled from any stream
    pub fn lines_pulled(&self) -> usize {
        self.lines_pulled.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn stream(&self, log: &FakeLog) -> LogStream {
        let pulled = self.lines_pulled.clone();
        let chunks = |lines: &[String]| {
            let pulled = pulled.clone();
            stream::iter(lines.to_vec()).map(move |line| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, io::Error>(format!("{line}\n").into_bytes())
            })
        };

        let released = self.released.clone();
        match log {
            FakeLog::Lines(lines) => Box::pin(Tracked {
                inner: chunks(lines).into_async_read(),
                released,
            }),
            FakeLog::ReadError(lines) => Box::pin(Tracked {
                inner: chunks(lines)
                    .chain(stream::once(async {
                        Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset"))
                    }))
                    .boxed()
                    .into_async_read(),
                released,
            }),
            FakeLog::Hang(lines) => Box::pin(Tracked {
                inner: chunks(lines).chain(stream::pending()).boxed().into_async_read(),
                released,
            }),
            FakeLog::OpenError(_) => unreachable!("open errors never produce a stream"),
        }
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_workload(&self, namespace: &str, name: &str) -> Result<Workload, ClientError> {
        self.record(format!("get_workload:{namespace}/{name}"));
        self.workload.clone()
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<ServiceInfo, ClientError> {
        self.record(format!("get_service:{namespace}/{name}"));
        self.service.clone()
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodInfo>, ClientError> {
        self.record(format!("list_pods:{namespace}/{label_selector}"));
        self.pods.clone()
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<LogStream, ClientError> {
        self.record(format!("open_log_stream:{namespace}/{pod}/{container}"));
        let log = self
            .logs
            .get(pod)
            .cloned()
            .unwrap_or_else(|| FakeLog::Lines(Vec::new()));
        if let FakeLog::OpenError(err) = &log {
            return Err(err.clone());
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.stream(&log))
    }

    async fn can_i(&self, attributes: &AccessAttributes) -> Result<bool, ClientError> {
        self.record(format!("can_i:{attributes}"));
        self.access.clone()
    }
}

/// Level, code and rendered text of each finding, without emission times
pub fn summarize(result: &diagnostics::DiagnosticResult) -> Vec<(Level, String, String)> {
    result
        .findings()
        .iter()
        .map(|f| (f.level, f.code().to_string(), f.render()))
        .collect()
}

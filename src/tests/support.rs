//! In-memory stand-ins for the tunnel and the cluster.

use crate::{
    cluster::application::service::query_service::ClusterSource,
    core::{
        domain::{
            error::{WatchError, WatchResult},
            model::{
                ControlDetails, JobRecord, JobSet, MemoryStats, NodeControlFields, NodeInventory,
                NodeRecord, QueueSummary,
            },
        },
        infrastructure::transport::{RemoteOutput, TunnelTransport},
    },
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Transport whose gateway fails a fixed number of times before connecting.
///
/// Hops are numbered handles; every lifecycle event is recorded in order.
#[derive(Default)]
pub struct FakeTransport {
    gateway_failures: AtomicU32,
    target_failures: AtomicU32,
    reject_login: bool,
    hop_delay: Duration,
    next_handle: AtomicU32,
    responses: Mutex<HashMap<String, RemoteOutput>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_gateway(self, times: u32) -> Self {
        self.gateway_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_target(self, times: u32) -> Self {
        self.target_failures.store(times, Ordering::SeqCst);
        self
    }

    /// Every hop takes `delay` to come up.
    pub fn slow_hops(mut self, delay: Duration) -> Self {
        self.hop_delay = delay;
        self
    }

    pub fn rejecting_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    pub fn respond(self, command: &str, output: RemoteOutput) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output);
        self
    }

    /// Shared view of the event log that outlives moving the transport.
    pub fn event_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.events)
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TunnelTransport for FakeTransport {
    type Gateway = u32;
    type Target = u32;

    async fn open_gateway(&self, _timeout: Duration) -> WatchResult<u32> {
        tokio::time::sleep(self.hop_delay).await;
        if self.reject_login {
            self.record("gateway rejected".to_string());
            return Err(WatchError::Authentication("password rejected".into()));
        }
        if Self::take_failure(&self.gateway_failures) {
            self.record("gateway refused".to_string());
            return Err(WatchError::Transport("connection refused".into()));
        }
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.record(format!("open gateway {}", id));
        Ok(id)
    }

    async fn open_target(&self, gateway: &u32, after: Duration) -> WatchResult<u32> {
        tokio::time::sleep(self.hop_delay).await;
        if Self::take_failure(&self.target_failures) {
            self.record(format!("target timeout via {}", gateway));
            return Err(WatchError::Timeout {
                operation: "opening target",
                after,
            });
        }
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.record(format!("open target {} via {}", id, gateway));
        Ok(id)
    }

    async fn exec(
        &self,
        target: &u32,
        command: &str,
        _timeout: Option<Duration>,
    ) -> WatchResult<RemoteOutput> {
        self.record(format!("exec on {}: {}", target, command));
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(RemoteOutput::failed))
    }

    async fn close_target(&self, target: u32) {
        self.record(format!("close target {}", target));
    }

    async fn close_gateway(&self, gateway: u32) {
        self.record(format!("close gateway {}", gateway));
    }
}

/// What the fake cluster reports for one cycle.
#[derive(Debug, Clone, Default)]
pub struct ClusterFrame {
    pub reachable: bool,
    pub nodes: NodeInventory,
    pub memory: BTreeMap<String, MemoryStats>,
    pub control: ControlDetails,
    pub queue: QueueSummary,
    pub jobs: JobSet,
    pub inventory_fails: bool,
}

impl ClusterFrame {
    pub fn online() -> Self {
        Self {
            reachable: true,
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: &str, state: &str) -> Self {
        self.nodes.insert(
            name.to_string(),
            NodeRecord::new(name, "alto", state, 48, 128000),
        );
        self
    }

    pub fn memory(mut self, name: &str, stats: MemoryStats) -> Self {
        self.memory.insert(name.to_string(), stats);
        self
    }

    pub fn control(mut self, name: &str, fields: &[(&str, &str)]) -> Self {
        let mut entry = NodeControlFields::default();
        for (key, value) in fields {
            entry.insert(key, value);
        }
        self.control.insert(name.to_string(), entry);
        self
    }

    pub fn job(mut self, id: &str, name: &str, node: &str) -> Self {
        self.jobs
            .insert(id.to_string(), JobRecord::new(name, "RUNNING", node));
        self
    }
}

/// A [`ClusterSource`] that serves one frame at a time.
#[derive(Default)]
pub struct ScriptedCluster {
    frame: Mutex<ClusterFrame>,
    calls: Mutex<Vec<String>>,
    heartbeat_panics: AtomicU32,
}

impl ScriptedCluster {
    pub fn new(frame: ClusterFrame) -> Self {
        Self {
            frame: Mutex::new(frame),
            calls: Mutex::new(Vec::new()),
            heartbeat_panics: AtomicU32::new(0),
        }
    }

    /// Makes the next `times` heartbeats panic.
    pub fn panicking_heartbeats(self, times: u32) -> Self {
        self.heartbeat_panics.store(times, Ordering::SeqCst);
        self
    }

    pub fn set(&self, frame: ClusterFrame) {
        *self.frame.lock().unwrap() = frame;
    }

    /// Calls made since the last drain.
    pub fn drain_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn frame(&self) -> ClusterFrame {
        self.frame.lock().unwrap().clone()
    }

    fn call(&self, name: String) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl ClusterSource for ScriptedCluster {
    async fn heartbeat(&self) -> bool {
        self.call("heartbeat".to_string());
        if FakeTransport::take_failure(&self.heartbeat_panics) {
            panic!("heartbeat exploded");
        }
        self.frame().reachable
    }

    async fn list_nodes(&self) -> WatchResult<NodeInventory> {
        self.call("list_nodes".to_string());
        let frame = self.frame();
        if frame.inventory_fails {
            return Err(WatchError::Connectivity {
                attempts: 3,
                source: Box::new(WatchError::Transport("reset by peer".into())),
            });
        }
        Ok(frame.nodes)
    }

    async fn direct_memory(&self, node: &str) -> MemoryStats {
        self.call(format!("direct_memory {}", node));
        self.frame().memory.get(node).copied().unwrap_or_default()
    }

    async fn control_fallback(&self, nodes: &[String]) -> WatchResult<ControlDetails> {
        self.call(format!("control_fallback {}", nodes.join(",")));
        Ok(self
            .frame()
            .control
            .into_iter()
            .filter(|(name, _)| nodes.contains(name))
            .collect())
    }

    async fn queue_summary(&self) -> WatchResult<QueueSummary> {
        self.call("queue_summary".to_string());
        Ok(self.frame().queue)
    }

    async fn user_jobs(&self, user: &str) -> JobSet {
        self.call(format!("user_jobs {}", user));
        self.frame().jobs
    }
}

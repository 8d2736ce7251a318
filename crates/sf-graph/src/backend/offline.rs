//! In-memory engine backend
//!
//! Keeps the node graph and every parameter write in memory without
//! producing sound. Used by the headless CLI and by tests, which inspect the
//! recorded graph and inject failures.

use std::collections::{HashMap, HashSet};

use futures_util::future::{self, BoxFuture};
use parking_lot::Mutex;
use sf_core::{Listener, ParamValue, Vec3};

use super::{AudioBackend, Endpoint, NodeId, NodeSpec};
use crate::context::ContextState;
use crate::error::{EngineError, EngineResult};

/// One recorded engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Created { node: NodeId, label: String },
    Connected { from: NodeId, to: Endpoint },
    Disconnected { node: NodeId },
    DisconnectedFrom { from: NodeId, to: Endpoint },
    Disposed { node: NodeId },
    Ramp {
        node: NodeId,
        param: String,
        value: f64,
        ramp_time: f64,
    },
    SetAt {
        node: NodeId,
        param: String,
        value: f64,
        delay: f64,
    },
    Set {
        node: NodeId,
        param: String,
        value: ParamValue,
    },
    Position { node: NodeId, position: Vec3 },
    Listener(Listener),
    Attack { node: NodeId, notes: Vec<f64> },
    Release { node: NodeId, notes: Vec<f64> },
    ReleaseAll { node: NodeId },
    Started { node: NodeId },
    Stopped { node: NodeId },
    Context(ContextState),
}

/// Snapshot of a live node
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineNode {
    pub spec: NodeSpec,
    pub params: HashMap<String, ParamValue>,
    pub position: Option<Vec3>,
    pub active_notes: Vec<f64>,
    pub started: bool,
}

impl OfflineNode {
    fn new(spec: NodeSpec) -> Self {
        let mut params = HashMap::new();
        let mut position = None;
        match &spec {
            NodeSpec::Gain { gain } => {
                params.insert("gain".to_string(), ParamValue::Number(*gain));
            }
            NodeSpec::Oscillator {
                frequency,
                volume_db,
                ..
            } => {
                params.insert("frequency".to_string(), ParamValue::Number(*frequency));
                params.insert("volume".to_string(), ParamValue::Number(*volume_db));
            }
            NodeSpec::Panner(settings) => position = Some(settings.position),
            NodeSpec::Synth(_) | NodeSpec::Effect(_) => {}
        }
        Self {
            spec,
            params,
            position,
            active_notes: Vec::new(),
            started: false,
        }
    }
}

#[derive(Debug)]
struct OfflineGraph {
    next_id: u64,
    nodes: HashMap<NodeId, OfflineNode>,
    edges: Vec<(NodeId, Endpoint)>,
    events: Vec<EngineEvent>,
    listener: Listener,
    state: ContextState,
    creations: usize,
    dirty_disposals: usize,

    // Failure injection
    fail_labels: Vec<String>,
    fail_at_creation: Option<usize>,
    unsupported: HashSet<String>,
    fail_resume: bool,
    fail_disconnect: HashSet<NodeId>,
}

impl OfflineGraph {
    fn node_mut(&mut self, node: NodeId) -> EngineResult<&mut OfflineNode> {
        self.nodes
            .get_mut(&node)
            .ok_or(EngineError::NodeNotFound(node))
    }

    fn check_param(&self, node: NodeId, param: &str) -> EngineResult<()> {
        if !self.nodes.contains_key(&node) {
            return Err(EngineError::NodeNotFound(node));
        }
        if self.unsupported.contains(param) {
            return Err(EngineError::Unsupported {
                node,
                param: param.to_string(),
            });
        }
        Ok(())
    }
}

/// Headless [`AudioBackend`] that records the graph in memory
#[derive(Debug)]
pub struct OfflineBackend {
    inner: Mutex<OfflineGraph>,
}

impl OfflineBackend {
    /// New backend whose context starts suspended (locked)
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(OfflineGraph {
                next_id: 1,
                nodes: HashMap::new(),
                edges: Vec::new(),
                events: Vec::new(),
                listener: Listener::default(),
                state: ContextState::Suspended,
                creations: 0,
                dirty_disposals: 0,
                fail_labels: Vec::new(),
                fail_at_creation: None,
                unsupported: HashSet::new(),
                fail_resume: false,
                fail_disconnect: HashSet::new(),
            }),
        }
    }

    /// New backend whose context is already running
    pub fn running() -> Self {
        let backend = Self::new();
        backend.inner.lock().state = ContextState::Running;
        backend
    }

    // ── Failure injection ────────────────────────────────────────────────

    /// Fail every creation whose node label starts with `prefix`
    /// (e.g. `"synth:fm_synth"`, `"gain"`)
    pub fn fail_creation_of(&self, prefix: &str) {
        self.inner.lock().fail_labels.push(prefix.to_string());
    }

    /// Fail the `n`-th node creation from now (1-based)
    pub fn fail_nth_creation(&self, n: usize) {
        let mut g = self.inner.lock();
        g.fail_at_creation = Some(g.creations + n);
    }

    pub fn clear_failures(&self) {
        let mut g = self.inner.lock();
        g.fail_labels.clear();
        g.fail_at_creation = None;
        g.unsupported.clear();
        g.fail_resume = false;
        g.fail_disconnect.clear();
    }

    /// Make every setter for `param` answer [`EngineError::Unsupported`]
    pub fn mark_unsupported(&self, param: &str) {
        self.inner.lock().unsupported.insert(param.to_string());
    }

    pub fn set_fail_resume(&self, fail: bool) {
        self.inner.lock().fail_resume = fail;
    }

    pub fn fail_disconnect_of(&self, node: NodeId) {
        self.inner.lock().fail_disconnect.insert(node);
    }

    /// Change the context state as if the engine did it on its own
    pub fn simulate_state_change(&self, state: ContextState) {
        let mut g = self.inner.lock();
        g.state = state;
        g.events.push(EngineEvent::Context(state));
    }

    // ── Inspection ───────────────────────────────────────────────────────

    pub fn node(&self, node: NodeId) -> Option<OfflineNode> {
        self.inner.lock().nodes.get(&node).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.lock().nodes.contains_key(&node)
    }

    pub fn param(&self, node: NodeId, param: &str) -> Option<ParamValue> {
        self.inner
            .lock()
            .nodes
            .get(&node)
            .and_then(|n| n.params.get(param).cloned())
    }

    /// Last numeric value written to `param`
    pub fn number_param(&self, node: NodeId, param: &str) -> Option<f64> {
        self.param(node, param).and_then(|v| v.as_f64())
    }

    pub fn is_connected(&self, from: NodeId, to: Endpoint) -> bool {
        self.inner.lock().edges.iter().any(|e| *e == (from, to))
    }

    pub fn outgoing(&self, from: NodeId) -> Vec<Endpoint> {
        self.inner
            .lock()
            .edges
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, t)| *t)
            .collect()
    }

    pub fn incoming(&self, to: NodeId) -> Vec<NodeId> {
        self.inner
            .lock()
            .edges
            .iter()
            .filter(|(_, t)| *t == Endpoint::Node(to))
            .map(|(f, _)| *f)
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.lock().edges.len()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.inner.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }

    pub fn listener(&self) -> Listener {
        self.inner.lock().listener
    }

    /// Disposals that happened while the node still had connections
    pub fn dirty_disposals(&self) -> usize {
        self.inner.lock().dirty_disposals
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn create_node(&self, spec: &NodeSpec) -> EngineResult<NodeId> {
        let mut g = self.inner.lock();
        g.creations += 1;
        let label = spec.label();

        if g.fail_at_creation == Some(g.creations) {
            g.fail_at_creation = None;
            return Err(EngineError::CreationFailed(format!(
                "injected failure creating {}",
                label
            )));
        }
        if g.fail_labels.iter().any(|p| label.starts_with(p.as_str())) {
            return Err(EngineError::CreationFailed(format!(
                "engine cannot create {}",
                label
            )));
        }

        let id = NodeId(g.next_id);
        g.next_id += 1;
        g.nodes.insert(id, OfflineNode::new(spec.clone()));
        g.events.push(EngineEvent::Created { node: id, label });
        Ok(id)
    }

    fn connect(&self, from: NodeId, to: Endpoint) -> EngineResult<()> {
        let mut g = self.inner.lock();
        if !g.nodes.contains_key(&from) {
            return Err(EngineError::NodeNotFound(from));
        }
        if let Endpoint::Node(target) = to
            && !g.nodes.contains_key(&target)
        {
            return Err(EngineError::NodeNotFound(target));
        }
        if !g.edges.contains(&(from, to)) {
            g.edges.push((from, to));
        }
        g.events.push(EngineEvent::Connected { from, to });
        Ok(())
    }

    fn disconnect(&self, node: NodeId) -> EngineResult<()> {
        let mut g = self.inner.lock();
        if !g.nodes.contains_key(&node) {
            return Err(EngineError::NodeNotFound(node));
        }
        if g.fail_disconnect.contains(&node) {
            return Err(EngineError::Rejected(format!("cannot disconnect {}", node)));
        }
        g.edges.retain(|(f, _)| *f != node);
        g.events.push(EngineEvent::Disconnected { node });
        Ok(())
    }

    fn disconnect_from(&self, from: NodeId, to: Endpoint) -> EngineResult<()> {
        let mut g = self.inner.lock();
        if !g.nodes.contains_key(&from) {
            return Err(EngineError::NodeNotFound(from));
        }
        if g.fail_disconnect.contains(&from) {
            return Err(EngineError::Rejected(format!("cannot disconnect {}", from)));
        }
        g.edges.retain(|e| *e != (from, to));
        g.events.push(EngineEvent::DisconnectedFrom { from, to });
        Ok(())
    }

    fn dispose(&self, node: NodeId) -> EngineResult<()> {
        let mut g = self.inner.lock();
        if g.nodes.remove(&node).is_none() {
            return Err(EngineError::NodeNotFound(node));
        }
        let before = g.edges.len();
        g.edges
            .retain(|(f, t)| *f != node && *t != Endpoint::Node(node));
        if g.edges.len() != before {
            g.dirty_disposals += 1;
        }
        g.events.push(EngineEvent::Disposed { node });
        Ok(())
    }

    fn ramp_param(
        &self,
        node: NodeId,
        param: &str,
        value: f64,
        ramp_time: f64,
    ) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.check_param(node, param)?;
        g.node_mut(node)?
            .params
            .insert(param.to_string(), ParamValue::Number(value));
        g.events.push(EngineEvent::Ramp {
            node,
            param: param.to_string(),
            value,
            ramp_time,
        });
        Ok(())
    }

    fn set_param_at(&self, node: NodeId, param: &str, value: f64, delay: f64) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.check_param(node, param)?;
        g.node_mut(node)?
            .params
            .insert(param.to_string(), ParamValue::Number(value));
        g.events.push(EngineEvent::SetAt {
            node,
            param: param.to_string(),
            value,
            delay,
        });
        Ok(())
    }

    fn set_param(&self, node: NodeId, param: &str, value: ParamValue) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.check_param(node, param)?;
        g.node_mut(node)?
            .params
            .insert(param.to_string(), value.clone());
        g.events.push(EngineEvent::Set {
            node,
            param: param.to_string(),
            value,
        });
        Ok(())
    }

    fn set_position(&self, node: NodeId, position: Vec3, _ramp_time: f64) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.node_mut(node)?.position = Some(position);
        g.events.push(EngineEvent::Position { node, position });
        Ok(())
    }

    fn set_listener(&self, listener: &Listener) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.listener = *listener;
        g.events.push(EngineEvent::Listener(*listener));
        Ok(())
    }

    fn trigger_attack(&self, node: NodeId, notes: &[f64]) -> EngineResult<()> {
        let mut g = self.inner.lock();
        let n = g.node_mut(node)?;
        n.active_notes.extend_from_slice(notes);
        n.started = true;
        g.events.push(EngineEvent::Attack {
            node,
            notes: notes.to_vec(),
        });
        Ok(())
    }

    fn trigger_release(&self, node: NodeId, notes: &[f64]) -> EngineResult<()> {
        let mut g = self.inner.lock();
        let n = g.node_mut(node)?;
        n.active_notes.retain(|a| !notes.contains(a));
        if n.active_notes.is_empty() {
            n.started = false;
        }
        g.events.push(EngineEvent::Release {
            node,
            notes: notes.to_vec(),
        });
        Ok(())
    }

    fn release_all(&self, node: NodeId) -> EngineResult<()> {
        let mut g = self.inner.lock();
        let n = g.node_mut(node)?;
        n.active_notes.clear();
        n.started = false;
        g.events.push(EngineEvent::ReleaseAll { node });
        Ok(())
    }

    fn start_node(&self, node: NodeId) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.node_mut(node)?.started = true;
        g.events.push(EngineEvent::Started { node });
        Ok(())
    }

    fn stop_node(&self, node: NodeId) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.node_mut(node)?.started = false;
        g.events.push(EngineEvent::Stopped { node });
        Ok(())
    }

    fn context_state(&self) -> ContextState {
        self.inner.lock().state
    }

    fn resume(&self) -> BoxFuture<'_, EngineResult<()>> {
        let result = {
            let mut g = self.inner.lock();
            if g.state == ContextState::Closed {
                Err(EngineError::ContextUnavailable("context is closed".into()))
            } else if g.fail_resume {
                Err(EngineError::ContextUnavailable(
                    "resume refused by engine".into(),
                ))
            } else {
                g.state = ContextState::Running;
                g.events.push(EngineEvent::Context(ContextState::Running));
                Ok(())
            }
        };
        Box::pin(future::ready(result))
    }

    fn suspend(&self) -> EngineResult<()> {
        let mut g = self.inner.lock();
        if g.state == ContextState::Closed {
            return Err(EngineError::ContextUnavailable("context is closed".into()));
        }
        g.state = ContextState::Suspended;
        g.events.push(EngineEvent::Context(ContextState::Suspended));
        Ok(())
    }

    fn close(&self) -> EngineResult<()> {
        let mut g = self.inner.lock();
        g.state = ContextState::Closed;
        g.events.push(EngineEvent::Context(ContextState::Closed));
        Ok(())
    }
}

//! The in-process render graph behind `SoftwareHost`.
//!
//! Nodes live in an arena indexed by `NodeId`; ids are never reused, so a
//! stale id held by the chain can only miss, never alias a newer node.
//! Rendering walks the nodes in topological order one block at a time.

use std::time::Duration;

use rodio::Source;
use rodio::source::UniformSourceIterator;

use super::analyser::Analyser;
use super::convolver::{Convolver, DEFAULT_PARTITION};
use super::dsp::{Biquad, pan_frame};
use super::host::{HostError, NodeId, NodeSpec, Param, SourceStatus};
use super::types::{AnalysisSnapshot, ImpulseResponse, SourceHandle};

/// Frames rendered per graph pass.
pub(crate) const RENDER_QUANTUM: usize = 128;

type Frame = [f32; 2];

struct SourceNode {
    input: UniformSourceIterator<SourceHandle>,
    running: bool,
    ended: bool,
    frames: u64,
}

impl SourceNode {
    fn next_frame(&mut self) -> Frame {
        if !self.running || self.ended {
            return [0.0; 2];
        }
        match (self.input.next(), self.input.next()) {
            (Some(l), Some(r)) => {
                self.frames += 1;
                [l, r]
            }
            _ => {
                self.ended = true;
                [0.0; 2]
            }
        }
    }
}

enum Node {
    Destination,
    Source(Box<SourceNode>),
    Biquad(Biquad),
    Gain(f32),
    Panner(f32),
    Convolver(Box<Convolver>),
    Analyser(Box<Analyser>),
}

struct Slot {
    node: Node,
    output: Vec<Frame>,
}

pub(crate) struct RenderGraph {
    sample_rate: u32,
    slots: Vec<Option<Slot>>,
    edges: Vec<(NodeId, NodeId)>,
    order: Option<Vec<NodeId>>,
    destination: NodeId,
    scratch: Vec<Frame>,
}

impl RenderGraph {
    pub(crate) fn new(sample_rate: u32) -> Self {
        let mut graph = Self {
            sample_rate,
            slots: Vec::new(),
            edges: Vec::new(),
            order: None,
            destination: NodeId(0),
            scratch: vec![[0.0; 2]; RENDER_QUANTUM],
        };
        graph.destination = graph.insert(Node::Destination);
        graph
    }

    pub(crate) fn destination(&self) -> NodeId {
        self.destination
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            node,
            output: vec![[0.0; 2]; RENDER_QUANTUM],
        }));
        self.order = None;
        id
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, HostError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(HostError::UnknownNode(id))
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, HostError> {
        let sr = self.sample_rate as f32;
        let node = match spec {
            NodeSpec::Biquad {
                kind,
                frequency,
                q,
                gain_db,
            } => {
                if !(frequency > 0.0) {
                    return Err(HostError::InvalidSpec(format!("filter frequency {frequency}")));
                }
                Node::Biquad(Biquad::new(kind, sr, frequency, q, gain_db))
            }
            NodeSpec::Gain { gain } => Node::Gain(gain),
            NodeSpec::StereoPanner { pan } => Node::Panner(pan.clamp(-1.0, 1.0)),
            NodeSpec::Convolver => Node::Convolver(Box::new(Convolver::new(DEFAULT_PARTITION))),
            NodeSpec::Analyser {
                fft_size,
                smoothing,
            } => {
                if !fft_size.is_power_of_two() {
                    return Err(HostError::InvalidSpec(format!("fft size {fft_size}")));
                }
                Node::Analyser(Box::new(Analyser::new(fft_size, smoothing)))
            }
        };
        Ok(self.insert(node))
    }

    pub(crate) fn create_source(&mut self, handle: SourceHandle) -> NodeId {
        let input = UniformSourceIterator::new(handle, 2, self.sample_rate);
        self.insert(Node::Source(Box::new(SourceNode {
            input,
            running: false,
            ended: false,
            frames: 0,
        })))
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<(), HostError> {
        if id == self.destination {
            return Err(HostError::Unsupported(id, "removal"));
        }
        self.slot_mut(id)?;
        self.slots[id.0] = None;
        self.edges.retain(|&(from, to)| from != id && to != id);
        self.order = None;
        Ok(())
    }

    pub(crate) fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        self.slot_mut(from)?;
        self.slot_mut(to)?;
        if from == self.destination {
            return Err(HostError::Unsupported(from, "outgoing edges"));
        }
        if from == to || self.reaches(to, from) {
            return Err(HostError::Cycle(from, to));
        }
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
            self.order = None;
        }
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, id: NodeId) -> Result<(), HostError> {
        self.slot_mut(id)?;
        self.edges.retain(|&(from, _)| from != id);
        self.order = None;
        Ok(())
    }

    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = vec![false; self.slots.len()];
        while let Some(n) = stack.pop() {
            if n == target {
                return true;
            }
            if std::mem::replace(&mut seen[n.0], true) {
                continue;
            }
            stack.extend(self.edges.iter().filter(|e| e.0 == n).map(|e| e.1));
        }
        false
    }

    pub(crate) fn set_param(&mut self, id: NodeId, param: Param) -> Result<(), HostError> {
        let slot = self.slot_mut(id)?;
        match (&mut slot.node, param) {
            (Node::Gain(g), Param::Gain(v)) => *g = v.max(0.0),
            (Node::Biquad(f), Param::FilterGain(db)) => f.set_gain_db(db),
            (Node::Panner(p), Param::Pan(v)) => *p = v.clamp(-1.0, 1.0),
            _ => return Err(HostError::Unsupported(id, "this parameter")),
        }
        Ok(())
    }

    pub(crate) fn set_impulse(&mut self, id: NodeId, impulse: &ImpulseResponse) -> Result<(), HostError> {
        match &mut self.slot_mut(id)?.node {
            Node::Convolver(c) => {
                c.set_impulse(impulse);
                Ok(())
            }
            _ => Err(HostError::Unsupported(id, "an impulse response")),
        }
    }

    fn source_mut(&mut self, id: NodeId) -> Result<&mut SourceNode, HostError> {
        match &mut self.slot_mut(id)?.node {
            Node::Source(s) => Ok(s),
            _ => Err(HostError::Unsupported(id, "transport control")),
        }
    }

    pub(crate) fn set_source_running(&mut self, id: NodeId, running: bool) -> Result<(), HostError> {
        self.source_mut(id)?.running = running;
        Ok(())
    }

    pub(crate) fn seek_source(&mut self, id: NodeId, position: Duration) -> Result<(), HostError> {
        let sample_rate = self.sample_rate;
        let source = self.source_mut(id)?;
        source
            .input
            .try_seek(position)
            .map_err(|e| HostError::Seek(e.to_string()))?;
        source.frames = (position.as_secs_f64() * sample_rate as f64) as u64;
        source.ended = false;
        Ok(())
    }

    pub(crate) fn source_status(&self, id: NodeId) -> Option<SourceStatus> {
        match &self.slot(id)?.node {
            Node::Source(s) => Some(SourceStatus {
                position: Duration::from_secs_f64(s.frames as f64 / self.sample_rate as f64),
                running: s.running,
                ended: s.ended,
            }),
            _ => None,
        }
    }

    pub(crate) fn analysis(&self, id: NodeId) -> Option<AnalysisSnapshot> {
        match &self.slot(id)?.node {
            Node::Analyser(a) => Some(a.snapshot()),
            _ => None,
        }
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn source_count(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| matches!(s.node, Node::Source(_)))
            .count()
    }

    /// Kahn's algorithm over live nodes. Cycles are rejected at connect time.
    fn topological_order(&self) -> Vec<NodeId> {
        let mut indegree = vec![0usize; self.slots.len()];
        for &(_, to) in &self.edges {
            indegree[to.0] += 1;
        }
        let mut ready: Vec<NodeId> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, s)| s.is_some() && indegree[*i] == 0)
            .map(|(i, _)| NodeId(i))
            .collect();
        let mut order = Vec::with_capacity(self.slots.len());
        while let Some(n) = ready.pop() {
            order.push(n);
            for &(from, to) in &self.edges {
                if from == n {
                    indegree[to.0] -= 1;
                    if indegree[to.0] == 0 {
                        ready.push(to);
                    }
                }
            }
        }
        order
    }

    /// Render one quantum into `out` (at most `RENDER_QUANTUM` frames).
    pub(crate) fn render_block(&mut self, out: &mut [Frame]) {
        let frames = out.len().min(RENDER_QUANTUM);
        let order = match self.order.take() {
            Some(order) => order,
            None => self.topological_order(),
        };

        for &id in &order {
            // Sum every upstream output into the scratch input.
            let mut input = std::mem::take(&mut self.scratch);
            input[..frames].fill([0.0; 2]);
            for &(from, to) in &self.edges {
                if to != id {
                    continue;
                }
                if let Some(up) = self.slot(from) {
                    for (acc, f) in input[..frames].iter_mut().zip(&up.output) {
                        acc[0] += f[0];
                        acc[1] += f[1];
                    }
                }
            }

            if let Some(slot) = self.slots[id.0].as_mut() {
                process_node(&mut slot.node, &input[..frames], &mut slot.output[..frames]);
            }
            self.scratch = input;
        }

        match self.slot(self.destination) {
            Some(dest) => out[..frames].copy_from_slice(&dest.output[..frames]),
            None => out[..frames].fill([0.0; 2]),
        }
        self.order = Some(order);
    }
}

fn process_node(node: &mut Node, input: &[Frame], output: &mut [Frame]) {
    match node {
        Node::Destination => output.copy_from_slice(input),
        Node::Source(s) => {
            for o in output.iter_mut() {
                *o = s.next_frame();
            }
        }
        Node::Biquad(f) => {
            for (o, &i) in output.iter_mut().zip(input) {
                *o = f.process(i);
            }
        }
        Node::Gain(g) => {
            for (o, &[l, r]) in output.iter_mut().zip(input) {
                *o = [l * *g, r * *g];
            }
        }
        Node::Panner(p) => {
            for (o, &i) in output.iter_mut().zip(input) {
                *o = pan_frame(*p, i);
            }
        }
        Node::Convolver(c) => {
            for (o, &i) in output.iter_mut().zip(input) {
                *o = c.process(i);
            }
        }
        Node::Analyser(a) => {
            for (o, &i) in output.iter_mut().zip(input) {
                a.push(i);
                *o = i;
            }
            a.analyse();
        }
    }
}

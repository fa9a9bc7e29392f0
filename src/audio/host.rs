//! The audio capability provider seam.
//!
//! `AudioHost` hands out processing nodes by id and lets the signal chain
//! wire them together. The chain never touches samples directly; it only
//! creates nodes, connects edges and sets parameters.

use std::time::Duration;

use thiserror::Error;

use super::types::{AnalysisSnapshot, FilterKind, ImpulseResponse, SourceHandle};

/// Opaque handle to a node living inside a host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Everything needed to construct a processing node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    Biquad {
        kind: FilterKind,
        frequency: f32,
        q: f32,
        gain_db: f32,
    },
    Gain {
        gain: f32,
    },
    StereoPanner {
        pan: f32,
    },
    Convolver,
    Analyser {
        fft_size: usize,
        smoothing: f32,
    },
}

/// A single parameter update addressed to one node.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Param {
    /// Linear gain of a gain node.
    Gain(f32),
    /// Gain in decibels of a biquad stage.
    FilterGain(f32),
    /// Pan position of a stereo panner, `-1.0..=1.0`.
    Pan(f32),
}

/// Playback status of a source node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SourceStatus {
    pub position: Duration,
    pub running: bool,
    pub ended: bool,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no audio output device: {0}")]
    NoDevice(String),
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} does not accept {1}")]
    Unsupported(NodeId, &'static str),
    #[error("connecting {0:?} -> {1:?} would create a cycle")]
    Cycle(NodeId, NodeId),
    #[error("invalid node configuration: {0}")]
    InvalidSpec(String),
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("render graph lock poisoned")]
    Poisoned,
}

/// Constructible processing nodes plus a clock.
pub trait AudioHost {
    fn sample_rate(&self) -> u32;

    /// The final sink every chain terminates in.
    fn destination(&self) -> NodeId;

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, HostError>;

    /// Create a source node bound to `handle`. New sources start paused.
    fn create_source(&mut self, handle: SourceHandle) -> Result<NodeId, HostError>;

    /// Remove a node along with every edge touching it.
    fn remove_node(&mut self, node: NodeId) -> Result<(), HostError>;

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError>;

    /// Drop every outgoing edge of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<(), HostError>;

    fn set_param(&mut self, node: NodeId, param: Param) -> Result<(), HostError>;

    fn set_impulse(&mut self, node: NodeId, impulse: ImpulseResponse) -> Result<(), HostError>;

    fn set_source_running(&mut self, node: NodeId, running: bool) -> Result<(), HostError>;

    fn seek_source(&mut self, node: NodeId, position: Duration) -> Result<(), HostError>;

    fn source_status(&self, node: NodeId) -> Option<SourceStatus>;

    fn analysis(&self, node: NodeId) -> Option<AnalysisSnapshot>;

    /// Total number of edges in the graph.
    fn connection_count(&self) -> usize;

    /// Number of live source nodes.
    fn source_count(&self) -> usize;
}

//! `AudioHost` backed by the in-process render graph.
//!
//! With a device the graph is pulled by rodio's mixer through
//! [`GraphOutput`]; offline hosts only advance when rendered by hand.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rodio::{OutputStream, OutputStreamBuilder, Source};
use tracing::info;

use super::graph::{RENDER_QUANTUM, RenderGraph};
use super::host::{AudioHost, HostError, NodeId, NodeSpec, Param, SourceStatus};
use super::types::{AnalysisSnapshot, ImpulseResponse, SourceHandle};

pub struct SoftwareHost {
    graph: Arc<Mutex<RenderGraph>>,
    sample_rate: u32,
    destination: NodeId,
    // Keeps the device open; dropping it silences the graph.
    _stream: Option<OutputStream>,
}

impl SoftwareHost {
    /// Open the default output device and start pulling the graph.
    pub fn open_default(sample_rate: u32) -> Result<Self, HostError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| HostError::NoDevice(e.to_string()))?;
        // rodio logs to stderr when the stream is dropped, which tears the TUI.
        stream.log_on_drop(false);

        let host = Self::build(sample_rate, Some(stream));
        if let Some(stream) = host._stream.as_ref() {
            stream.mixer().add(GraphOutput::new(host.graph.clone(), sample_rate));
        }
        info!(sample_rate, "audio output opened");
        Ok(host)
    }

    /// A host with no device attached. Audio only advances through `render`.
    pub fn offline(sample_rate: u32) -> Self {
        Self::build(sample_rate, None)
    }

    fn build(sample_rate: u32, stream: Option<OutputStream>) -> Self {
        let graph = RenderGraph::new(sample_rate);
        let destination = graph.destination();
        Self {
            graph: Arc::new(Mutex::new(graph)),
            sample_rate,
            destination,
            _stream: stream,
        }
    }

    /// Handle for pulling audio by hand after the host is boxed away.
    #[cfg(test)]
    pub(crate) fn renderer(&self) -> Renderer {
        Renderer {
            graph: self.graph.clone(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RenderGraph>, HostError> {
        self.graph.lock().map_err(|_| HostError::Poisoned)
    }
}

impl AudioHost for SoftwareHost {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_node(&mut self, spec: NodeSpec) -> Result<NodeId, HostError> {
        self.lock()?.create_node(spec)
    }

    fn create_source(&mut self, handle: SourceHandle) -> Result<NodeId, HostError> {
        Ok(self.lock()?.create_source(handle))
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), HostError> {
        self.lock()?.remove_node(node)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), HostError> {
        self.lock()?.connect(from, to)
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), HostError> {
        self.lock()?.disconnect(node)
    }

    fn set_param(&mut self, node: NodeId, param: Param) -> Result<(), HostError> {
        self.lock()?.set_param(node, param)
    }

    fn set_impulse(&mut self, node: NodeId, impulse: ImpulseResponse) -> Result<(), HostError> {
        self.lock()?.set_impulse(node, &impulse)
    }

    fn set_source_running(&mut self, node: NodeId, running: bool) -> Result<(), HostError> {
        self.lock()?.set_source_running(node, running)
    }

    fn seek_source(&mut self, node: NodeId, position: Duration) -> Result<(), HostError> {
        self.lock()?.seek_source(node, position)
    }

    fn source_status(&self, node: NodeId) -> Option<SourceStatus> {
        self.lock().ok()?.source_status(node)
    }

    fn analysis(&self, node: NodeId) -> Option<AnalysisSnapshot> {
        self.lock().ok()?.analysis(node)
    }

    fn connection_count(&self) -> usize {
        self.lock().map(|g| g.connection_count()).unwrap_or(0)
    }

    fn source_count(&self) -> usize {
        self.lock().map(|g| g.source_count()).unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) struct Renderer {
    graph: Arc<Mutex<RenderGraph>>,
}

#[cfg(test)]
impl Renderer {
    /// Render `frames` stereo frames from the destination.
    pub(crate) fn render(&self, frames: usize) -> Result<Vec<[f32; 2]>, HostError> {
        let mut out = vec![[0.0; 2]; frames];
        let mut graph = self.graph.lock().map_err(|_| HostError::Poisoned)?;
        for chunk in out.chunks_mut(RENDER_QUANTUM) {
            graph.render_block(chunk);
        }
        Ok(out)
    }
}

/// Endless stereo stream rendered from the shared graph, one quantum at a
/// time, for rodio's mixer.
pub(crate) struct GraphOutput {
    graph: Arc<Mutex<RenderGraph>>,
    sample_rate: u32,
    block: Vec<[f32; 2]>,
    frame: usize,
    channel: usize,
}

impl GraphOutput {
    fn new(graph: Arc<Mutex<RenderGraph>>, sample_rate: u32) -> Self {
        Self {
            graph,
            sample_rate,
            block: vec![[0.0; 2]; RENDER_QUANTUM],
            frame: RENDER_QUANTUM,
            channel: 0,
        }
    }

    fn refill(&mut self) {
        match self.graph.lock() {
            Ok(mut graph) => graph.render_block(&mut self.block),
            Err(_) => self.block.fill([0.0; 2]),
        }
        self.frame = 0;
    }
}

impl Iterator for GraphOutput {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.frame >= self.block.len() {
            self.refill();
        }
        let sample = self.block[self.frame][self.channel];
        self.channel += 1;
        if self.channel == 2 {
            self.channel = 0;
            self.frame += 1;
        }
        Some(sample)
    }
}

impl Source for GraphOutput {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

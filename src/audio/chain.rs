//! The signal chain: a fixed-topology effect graph built once, with only the
//! source node swapped per track.
//!
//! ```text
//! source -> eq[0] -> .. -> eq[n] -> bass -> panner -+-> dry ---------+-> master -> analyser -> out
//!                                                   +-> reverb -> wet +
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{AudioSettings, MAX_REVERB_SECONDS};
use crate::error::{PlayerError, Result};

use super::host::{AudioHost, HostError, NodeId, NodeSpec, Param, SourceStatus};
use super::types::{AnalysisSnapshot, FilterKind, ImpulseResponse, SourceHandle};

/// Opens the host lazily, on first `initialize`.
pub type HostOpener = Box<dyn FnOnce(&AudioSettings) -> std::result::Result<Box<dyn AudioHost>, HostError>>;

struct Stages {
    eq: Vec<(u32, NodeId)>,
    bass: NodeId,
    panner: NodeId,
    dry: NodeId,
    wet: NodeId,
    master: NodeId,
    analyser: NodeId,
}

struct Graph {
    host: Box<dyn AudioHost>,
    stages: Stages,
    source: Option<NodeId>,
}

/// Parameter values, kept outside the graph so they survive until (and
/// across) initialization.
#[derive(Debug, Clone, PartialEq)]
struct Params {
    eq: Vec<(u32, f32)>,
    bass_boost: f32,
    pan: f32,
    reverb_mix: f32,
    volume: f32,
    muted: bool,
    previous_volume: f32,
}

pub struct SignalChain {
    settings: AudioSettings,
    opener: Option<HostOpener>,
    graph: Option<Graph>,
    unavailable: Option<String>,
    params: Params,
}

impl SignalChain {
    pub fn new(settings: AudioSettings, opener: HostOpener) -> Self {
        let volume = settings.initial_volume.clamp(0.0, 1.0);
        let params = Params {
            eq: settings.eq_bands.iter().map(|&f| (f, 0.0)).collect(),
            bass_boost: 0.0,
            pan: 0.0,
            reverb_mix: 0.0,
            volume,
            muted: false,
            previous_volume: volume,
        };
        Self {
            settings,
            opener: Some(opener),
            graph: None,
            unavailable: None,
            params,
        }
    }

    /// Build every stage exactly once. Later calls are no-ops; a failed
    /// first attempt is final for the session.
    pub fn initialize(&mut self) -> Result<()> {
        if self.graph.is_some() {
            return Ok(());
        }
        if let Some(reason) = &self.unavailable {
            return Err(PlayerError::CapabilityUnavailable(reason.clone()));
        }
        let Some(open) = self.opener.take() else {
            return Err(PlayerError::NotInitialized);
        };

        let built = open(&self.settings).and_then(|host| self.build(host));
        match built {
            Ok(graph) => {
                info!(bands = graph.stages.eq.len(), "signal chain ready");
                self.graph = Some(graph);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "audio unavailable for this session");
                self.unavailable = Some(e.to_string());
                Err(PlayerError::CapabilityUnavailable(e.to_string()))
            }
        }
    }

    fn build(&self, mut host: Box<dyn AudioHost>) -> std::result::Result<Graph, HostError> {
        let s = &self.settings;
        let p = &self.params;

        let mut eq = Vec::with_capacity(p.eq.len());
        let last = p.eq.len().saturating_sub(1);
        for (i, &(freq, gain_db)) in p.eq.iter().enumerate() {
            let kind = match i {
                0 => FilterKind::LowShelf,
                i if i == last => FilterKind::HighShelf,
                _ => FilterKind::Peaking,
            };
            let node = host.create_node(NodeSpec::Biquad {
                kind,
                frequency: freq as f32,
                q: s.eq_q,
                gain_db,
            })?;
            eq.push((freq, node));
        }

        let bass = host.create_node(NodeSpec::Biquad {
            kind: FilterKind::LowShelf,
            frequency: s.bass_boost_frequency,
            q: 1.0,
            gain_db: p.bass_boost,
        })?;
        let panner = host.create_node(NodeSpec::StereoPanner { pan: p.pan })?;
        let dry = host.create_node(NodeSpec::Gain {
            gain: 1.0 - p.reverb_mix,
        })?;
        let reverb = host.create_node(NodeSpec::Convolver)?;
        let wet = host.create_node(NodeSpec::Gain { gain: p.reverb_mix })?;
        let master = host.create_node(NodeSpec::Gain {
            gain: if p.muted { 0.0 } else { p.volume },
        })?;
        let analyser = host.create_node(NodeSpec::Analyser {
            fft_size: s.fft_size,
            smoothing: s.smoothing,
        })?;

        let impulse = generate_reverb_impulse(host.sample_rate(), s.reverb_seconds, s.reverb_decay);
        if impulse.is_empty() {
            debug!("reverb impulse is empty, wet path stays silent");
        } else {
            debug!(frames = impulse.len(), "reverb impulse generated");
            host.set_impulse(reverb, impulse)?;
        }

        let mut prev = None;
        for &(_, node) in &eq {
            if let Some(p) = prev {
                host.connect(p, node)?;
            }
            prev = Some(node);
        }
        if let Some(p) = prev {
            host.connect(p, bass)?;
        }
        host.connect(bass, panner)?;
        host.connect(panner, dry)?;
        host.connect(panner, reverb)?;
        host.connect(reverb, wet)?;
        host.connect(dry, master)?;
        host.connect(wet, master)?;
        host.connect(master, analyser)?;
        let destination = host.destination();
        host.connect(analyser, destination)?;

        Ok(Graph {
            host,
            stages: Stages {
                eq,
                bass,
                panner,
                dry,
                wet,
                master,
                analyser,
            },
            source: None,
        })
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }

    fn graph_mut(&mut self) -> Result<&mut Graph> {
        self.graph.as_mut().ok_or(PlayerError::NotInitialized)
    }

    /// Swap in a new source at the head of the chain. The previous source is
    /// disconnected and removed first, so exactly one stays live.
    pub fn attach_source(&mut self, handle: SourceHandle) -> Result<()> {
        self.initialize()?;
        let graph = self.graph_mut()?;

        if let Some(old) = graph.source.take() {
            graph.host.disconnect(old)?;
            graph.host.remove_node(old)?;
        }

        let head = match graph.stages.eq.first() {
            Some(&(_, node)) => node,
            None => graph.stages.bass,
        };
        let node = graph.host.create_source(handle)?;
        if let Err(e) = graph.host.connect(node, head) {
            graph.host.remove_node(node)?;
            return Err(e.into());
        }
        graph.source = Some(node);
        debug!(?node, "source attached");
        Ok(())
    }

    /// Drop the current source, leaving the effect stages in place.
    pub fn detach_source(&mut self) -> Result<()> {
        let Some(graph) = self.graph.as_mut() else {
            return Ok(());
        };
        if let Some(old) = graph.source.take() {
            graph.host.disconnect(old)?;
            graph.host.remove_node(old)?;
        }
        Ok(())
    }

    pub fn has_source(&self) -> bool {
        self.graph.as_ref().is_some_and(|g| g.source.is_some())
    }

    pub fn set_running(&mut self, running: bool) -> Result<()> {
        let graph = self.graph_mut()?;
        if let Some(source) = graph.source {
            graph.host.set_source_running(source, running)?;
        }
        Ok(())
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        let graph = self.graph_mut()?;
        if let Some(source) = graph.source {
            graph.host.seek_source(source, position)?;
        }
        Ok(())
    }

    pub fn source_status(&self) -> Option<SourceStatus> {
        let graph = self.graph.as_ref()?;
        graph.host.source_status(graph.source?)
    }

    pub fn position(&self) -> Duration {
        self.source_status().map(|s| s.position).unwrap_or_default()
    }

    pub fn source_ended(&self) -> bool {
        self.source_status().is_some_and(|s| s.ended)
    }

    pub fn set_eq_gain(&mut self, band: u32, gain_db: f32) -> Result<()> {
        let Some(slot) = self.params.eq.iter_mut().find(|(f, _)| *f == band) else {
            return Err(PlayerError::UnknownBand(band));
        };
        slot.1 = gain_db;
        if let Some(graph) = self.graph.as_mut() {
            if let Some(&(_, node)) = graph.stages.eq.iter().find(|(f, _)| *f == band) {
                graph.host.set_param(node, Param::FilterGain(gain_db))?;
            }
        }
        Ok(())
    }

    pub fn set_bass_boost(&mut self, gain_db: f32) -> Result<()> {
        self.params.bass_boost = gain_db;
        if let Some(graph) = self.graph.as_mut() {
            graph
                .host
                .set_param(graph.stages.bass, Param::FilterGain(gain_db))?;
        }
        Ok(())
    }

    pub fn set_pan_angle(&mut self, pan: f32) -> Result<()> {
        let pan = pan.clamp(-1.0, 1.0);
        self.params.pan = pan;
        if let Some(graph) = self.graph.as_mut() {
            graph.host.set_param(graph.stages.panner, Param::Pan(pan))?;
        }
        Ok(())
    }

    pub fn set_reverb_mix(&mut self, wet: f32) -> Result<()> {
        let wet = wet.clamp(0.0, 1.0);
        self.params.reverb_mix = wet;
        if let Some(graph) = self.graph.as_mut() {
            graph.host.set_param(graph.stages.wet, Param::Gain(wet))?;
            graph.host.set_param(graph.stages.dry, Param::Gain(1.0 - wet))?;
        }
        Ok(())
    }

    /// Set the master volume. While muted only the restore value changes.
    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        if self.params.muted {
            self.params.previous_volume = volume;
            return Ok(());
        }
        self.params.volume = volume;
        self.apply_master()
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<()> {
        if muted == self.params.muted {
            return Ok(());
        }
        if muted {
            self.params.previous_volume = self.params.volume;
            self.params.volume = 0.0;
        } else {
            self.params.volume = self.params.previous_volume;
        }
        self.params.muted = muted;
        self.apply_master()
    }

    pub fn toggle_mute(&mut self) -> Result<()> {
        self.set_muted(!self.params.muted)
    }

    fn apply_master(&mut self) -> Result<()> {
        let volume = self.params.volume;
        if let Some(graph) = self.graph.as_mut() {
            graph.host.set_param(graph.stages.master, Param::Gain(volume))?;
        }
        Ok(())
    }

    /// Current frequency and time-domain data from the analysis tap.
    pub fn analysis_snapshot(&self) -> Option<AnalysisSnapshot> {
        let graph = self.graph.as_ref()?;
        graph.host.analysis(graph.stages.analyser)
    }

    pub fn eq_gains(&self) -> &[(u32, f32)] {
        &self.params.eq
    }

    pub fn bass_boost(&self) -> f32 {
        self.params.bass_boost
    }

    pub fn pan_angle(&self) -> f32 {
        self.params.pan
    }

    pub fn reverb_mix(&self) -> f32 {
        self.params.reverb_mix
    }

    pub fn master_volume(&self) -> f32 {
        self.params.volume
    }

    /// The volume that applies once unmuted.
    pub fn unmuted_volume(&self) -> f32 {
        if self.params.muted {
            self.params.previous_volume
        } else {
            self.params.volume
        }
    }

    pub fn is_muted(&self) -> bool {
        self.params.muted
    }

    pub fn connection_count(&self) -> usize {
        self.graph
            .as_ref()
            .map(|g| g.host.connection_count())
            .unwrap_or(0)
    }

    pub fn active_source_count(&self) -> usize {
        self.graph.as_ref().map(|g| g.host.source_count()).unwrap_or(0)
    }
}

/// Stereo decaying noise: `noise * exp(-i / (sample_rate * decay))` over
/// `seconds` of audio, capped at `MAX_REVERB_SECONDS`. Only the envelope
/// is deterministic.
pub fn generate_reverb_impulse(sample_rate: u32, seconds: f32, decay: f32) -> ImpulseResponse {
    let rate = sample_rate as f32;
    let seconds = if seconds.is_finite() {
        seconds.clamp(0.0, MAX_REVERB_SECONDS)
    } else {
        0.0
    };
    let len = (rate * seconds) as usize;
    let tau = (rate * decay).max(f32::MIN_POSITIVE);

    let mut left = Vec::with_capacity(len);
    let mut right = Vec::with_capacity(len);
    for i in 0..len {
        let envelope = (-(i as f32) / tau).exp();
        left.push((rand::random::<f32>() * 2.0 - 1.0) * envelope);
        right.push((rand::random::<f32>() * 2.0 - 1.0) * envelope);
    }

    ImpulseResponse {
        left,
        right,
        sample_rate,
    }
}

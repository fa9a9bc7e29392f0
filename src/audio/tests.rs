use std::sync::{Arc, Mutex};
use std::time::Duration;

use rodio::buffer::SamplesBuffer;

use super::chain::generate_reverb_impulse;
use super::host::NodeSpec;
use super::*;
use crate::config::AudioSettings;
use crate::error::PlayerError;

type RendererSlot = Arc<Mutex<Option<Renderer>>>;

fn settings() -> AudioSettings {
    AudioSettings {
        // Short kernel keeps the tests fast.
        reverb_seconds: 0.05,
        ..AudioSettings::default()
    }
}

fn offline_chain() -> (SignalChain, RendererSlot) {
    let slot: RendererSlot = Arc::new(Mutex::new(None));
    let slot_for_opener = slot.clone();
    let chain = SignalChain::new(
        settings(),
        Box::new(move |s: &AudioSettings| -> Result<Box<dyn AudioHost>, HostError> {
            let host = SoftwareHost::offline(s.sample_rate);
            *slot_for_opener.lock().unwrap() = Some(host.renderer());
            Ok(Box::new(host))
        }),
    );
    (chain, slot)
}

fn render(slot: &RendererSlot, frames: usize) -> Vec<[f32; 2]> {
    slot.lock()
        .unwrap()
        .as_ref()
        .expect("chain not initialized")
        .render(frames)
        .unwrap()
}

fn constant(value: f32, frames: usize) -> SourceHandle {
    Box::new(SamplesBuffer::new(2, 44_100, vec![value; frames * 2]))
}

// 5 bands: 4 eq->eq, eq->bass, bass->panner, panner->dry, panner->reverb,
// reverb->wet, dry->master, wet->master, master->analyser, analyser->out.
const FIXED_EDGES: usize = 13;

#[test]
fn initialize_is_idempotent() {
    let (mut chain, _slot) = offline_chain();
    assert!(!chain.is_initialized());

    chain.initialize().unwrap();
    assert_eq!(chain.connection_count(), FIXED_EDGES);

    chain.initialize().unwrap();
    assert_eq!(chain.connection_count(), FIXED_EDGES);
    assert_eq!(chain.active_source_count(), 0);
}

#[test]
fn attaching_sources_keeps_exactly_one_live() {
    let (mut chain, _slot) = offline_chain();

    chain.attach_source(constant(0.1, 64)).unwrap();
    assert_eq!(chain.active_source_count(), 1);
    assert_eq!(chain.connection_count(), FIXED_EDGES + 1);

    for _ in 0..4 {
        chain.attach_source(constant(0.1, 64)).unwrap();
        assert_eq!(chain.active_source_count(), 1);
        assert_eq!(chain.connection_count(), FIXED_EDGES + 1);
    }

    chain.detach_source().unwrap();
    assert_eq!(chain.active_source_count(), 0);
    assert_eq!(chain.connection_count(), FIXED_EDGES);
}

#[test]
fn attach_preserves_effect_parameters() {
    let (mut chain, _slot) = offline_chain();
    chain.set_eq_gain(1000, 4.5).unwrap();
    chain.set_pan_angle(-0.25).unwrap();
    chain.set_reverb_mix(0.3).unwrap();

    chain.attach_source(constant(0.1, 64)).unwrap();
    chain.attach_source(constant(0.2, 64)).unwrap();

    assert!(chain.eq_gains().contains(&(1000, 4.5)));
    assert_eq!(chain.pan_angle(), -0.25);
    assert_eq!(chain.reverb_mix(), 0.3);
}

#[test]
fn mute_then_unmute_restores_exact_volume() {
    let (mut chain, _slot) = offline_chain();
    chain.initialize().unwrap();
    chain.set_master_volume(0.7).unwrap();

    chain.set_muted(true).unwrap();
    assert!(chain.is_muted());
    assert_eq!(chain.master_volume(), 0.0);

    chain.set_muted(false).unwrap();
    assert_eq!(chain.master_volume(), 0.7);
}

#[test]
fn volume_change_while_muted_only_updates_restore_value() {
    let (mut chain, _slot) = offline_chain();
    chain.set_master_volume(0.4).unwrap();
    chain.toggle_mute().unwrap();
    chain.set_master_volume(0.9).unwrap();
    assert_eq!(chain.master_volume(), 0.0);

    chain.toggle_mute().unwrap();
    assert_eq!(chain.master_volume(), 0.9);
}

#[test]
fn setters_clamp_to_range() {
    let (mut chain, _slot) = offline_chain();
    chain.set_pan_angle(3.0).unwrap();
    chain.set_reverb_mix(-1.0).unwrap();
    chain.set_master_volume(1.5).unwrap();
    assert_eq!(chain.pan_angle(), 1.0);
    assert_eq!(chain.reverb_mix(), 0.0);
    assert_eq!(chain.master_volume(), 1.0);
}

#[test]
fn unknown_band_is_rejected() {
    let (mut chain, _slot) = offline_chain();
    assert!(matches!(
        chain.set_eq_gain(123, 3.0),
        Err(PlayerError::UnknownBand(123))
    ));
}

#[test]
fn unavailable_host_is_reported_once_and_never_retried() {
    let mut chain = SignalChain::new(
        settings(),
        Box::new(|_: &AudioSettings| -> Result<Box<dyn AudioHost>, HostError> {
            Err(HostError::NoDevice("none".into()))
        }),
    );

    assert!(matches!(
        chain.initialize(),
        Err(PlayerError::CapabilityUnavailable(_))
    ));
    assert!(chain.is_unavailable());
    assert!(matches!(
        chain.attach_source(constant(0.1, 8)),
        Err(PlayerError::CapabilityUnavailable(_))
    ));
    assert!(chain.analysis_snapshot().is_none());
    // Parameter changes still land in the stored values.
    chain.set_bass_boost(6.0).unwrap();
    assert_eq!(chain.bass_boost(), 6.0);
}

#[test]
fn flat_chain_passes_signal_at_master_volume() {
    let (mut chain, slot) = offline_chain();
    chain.set_master_volume(0.7).unwrap();
    chain.attach_source(constant(0.5, 8_192)).unwrap();
    chain.set_running(true).unwrap();

    let out = render(&slot, 4_096);
    let [l, r] = out[4_000];
    assert!((l - 0.35).abs() < 1e-3, "left {l}");
    assert!((r - 0.35).abs() < 1e-3, "right {r}");

    let snap = chain.analysis_snapshot().unwrap();
    assert_eq!(snap.bin_count(), 256);
    assert!(snap.frequency.iter().any(|&b| b > 0));
}

#[test]
fn paused_source_is_silent_and_does_not_advance() {
    let (mut chain, slot) = offline_chain();
    chain.attach_source(constant(0.5, 1_024)).unwrap();

    let out = render(&slot, 512);
    assert!(out.iter().all(|f| *f == [0.0, 0.0]));
    assert_eq!(chain.position(), Duration::ZERO);
    assert!(!chain.source_ended());
}

#[test]
fn exhausted_source_reports_end() {
    let (mut chain, slot) = offline_chain();
    chain.attach_source(constant(0.5, 441)).unwrap();
    chain.set_running(true).unwrap();

    render(&slot, 1_024);
    assert!(chain.source_ended());
    let played = chain.position().as_secs_f64();
    assert!((played - 0.01).abs() < 1e-6, "position {played}");
}

#[test]
fn reverb_impulse_decays_inside_envelope() {
    let ir = generate_reverb_impulse(8_000, 2.5, 0.6);
    assert_eq!(ir.len(), 20_000);
    assert_eq!(ir.sample_rate, 8_000);

    for (i, (&l, &r)) in ir.left.iter().zip(&ir.right).enumerate() {
        let envelope = (-(i as f32) / (8_000.0 * 0.6)).exp();
        assert!(l.abs() <= envelope + 1e-6);
        assert!(r.abs() <= envelope + 1e-6);
    }
    assert_ne!(ir.left, ir.right);
}

#[test]
fn reverb_impulse_length_is_capped() {
    let rate = 100;
    assert!(generate_reverb_impulse(rate, f32::INFINITY, 0.6).is_empty());
    assert!(generate_reverb_impulse(rate, f32::NAN, 0.6).is_empty());
    let capped = generate_reverb_impulse(rate, 1e9, 0.6);
    assert_eq!(capped.len(), (rate as f32 * crate::config::MAX_REVERB_SECONDS) as usize);
}

#[test]
fn graph_rejects_cycles_and_unknown_nodes() {
    let mut host = SoftwareHost::offline(44_100);
    let a = host.create_node(NodeSpec::Gain { gain: 1.0 }).unwrap();
    let b = host.create_node(NodeSpec::Gain { gain: 1.0 }).unwrap();
    host.connect(a, b).unwrap();
    assert!(matches!(host.connect(b, a), Err(HostError::Cycle(_, _))));

    host.remove_node(b).unwrap();
    assert_eq!(host.connection_count(), 0);
    assert!(matches!(
        host.connect(a, b),
        Err(HostError::UnknownNode(_))
    ));
}

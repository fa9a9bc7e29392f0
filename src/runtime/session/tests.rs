use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rodio::Source;
use tempfile::{TempDir, tempdir};

use super::*;
use crate::app::{LoadState, Transport};
use crate::audio::{AudioHost, HostError, Renderer, RepeatMode, SoftwareHost};
use crate::config::AudioSettings;
use crate::runtime::tests::write_wav;

type RendererSlot = Arc<Mutex<Option<Renderer>>>;

/// Offline session whose render graph the test pulls by hand.
fn rendered_session() -> (Session, RendererSlot) {
    let slot: RendererSlot = Arc::new(Mutex::new(None));
    let captured = slot.clone();
    let settings = Settings {
        audio: AudioSettings {
            reverb_seconds: 0.05,
            ..AudioSettings::default()
        },
        ..Settings::default()
    };
    let session = Session::new(
        &settings,
        Box::new(
            move |s: &AudioSettings| -> std::result::Result<Box<dyn AudioHost>, HostError> {
                let host = SoftwareHost::offline(s.sample_rate);
                *captured.lock().unwrap() = Some(host.renderer());
                Ok(Box::new(host))
            },
        ),
    );
    (session, slot)
}

fn render(slot: &RendererSlot, frames: usize) -> Vec<[f32; 2]> {
    slot.lock()
        .unwrap()
        .as_ref()
        .expect("chain not initialized")
        .render(frames)
        .unwrap()
}

fn audible(frames: &[[f32; 2]]) -> bool {
    frames.iter().any(|f| f[0].abs() > 0.01 && f[1].abs() > 0.01)
}

fn wavs(dir: &TempDir, lengths: &[f32]) -> Vec<PathBuf> {
    lengths
        .iter()
        .enumerate()
        .map(|(i, &seconds)| {
            let path = dir.path().join(format!("{i}.wav"));
            write_wav(&path, seconds);
            path
        })
        .collect()
}

fn playing(session: &Session) -> bool {
    session.chain().has_source()
        && !session.chain().source_ended()
        && session.player().transport() == Transport::Playing
}

/// Tick until `done` holds or two seconds pass.
fn settle(session: &mut Session, done: impl Fn(&Session) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        session.tick();
        if done(session) {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

// 0.1 s tracks end well inside this many frames at 44.1 kHz.
const PAST_END: usize = 8_192;

#[test]
fn natural_end_advances_and_keeps_playing() {
    let dir = tempdir().unwrap();
    let (mut session, slot) = rendered_session();
    session.apply(Command::Add(wavs(&dir, &[0.1, 0.1])));
    session.apply(Command::PlayIndex(0));
    assert!(settle(&mut session, playing));
    let generation = session.player().generation();

    render(&slot, PAST_END);
    assert!(session.chain().source_ended());
    session.tick();

    assert_eq!(session.player().current_index(), Some(1));
    assert!(session.player().state().is_playing);
    assert_eq!(session.player().generation(), generation + 1);

    for _ in 0..3 {
        session.tick();
    }
    assert_eq!(session.player().generation(), generation + 1);

    assert!(settle(&mut session, playing));
    assert!(audible(&render(&slot, 2_048)));
}

#[test]
fn repeat_one_end_restarts_from_zero() {
    let dir = tempdir().unwrap();
    let (mut session, slot) = rendered_session();
    session.apply(Command::Add(wavs(&dir, &[0.1])));
    session.apply(Command::CycleRepeat);
    session.apply(Command::CycleRepeat);
    assert_eq!(session.player().state().repeat_mode, RepeatMode::One);

    session.apply(Command::PlayIndex(0));
    assert!(settle(&mut session, playing));

    render(&slot, PAST_END);
    assert!(session.chain().source_ended());
    session.tick();

    assert_eq!(session.player().current_index(), Some(0));
    assert!(session.player().state().is_playing);
    assert!(settle(&mut session, playing));
    assert!(session.chain().position() < Duration::from_millis(10));
    assert!(audible(&render(&slot, 2_048)));
}

#[test]
fn stopped_end_is_reported_once_and_play_rewinds() {
    let dir = tempdir().unwrap();
    let (mut session, slot) = rendered_session();
    session.apply(Command::Add(wavs(&dir, &[0.1])));
    session.apply(Command::PlayIndex(0));
    assert!(settle(&mut session, playing));
    let generation = session.player().generation();

    render(&slot, PAST_END);
    session.tick();
    assert_eq!(session.player().transport(), Transport::Paused);
    assert!(session.chain().has_source());
    assert!(session.chain().source_ended());

    // With repeat-all on, a second report of the same end would reload.
    session.apply(Command::CycleRepeat);
    for _ in 0..3 {
        session.tick();
    }
    assert_eq!(session.player().generation(), generation);
    assert!(session.chain().source_ended());

    session.apply(Command::Play);
    assert_eq!(session.player().transport(), Transport::Playing);
    assert!(!session.chain().source_ended());
    assert_eq!(session.chain().position(), Duration::ZERO);
    assert!(audible(&render(&slot, 2_048)));
}

#[test]
fn superseded_load_never_attaches() {
    let dir = tempdir().unwrap();
    let (mut session, slot) = rendered_session();
    session.apply(Command::Add(wavs(&dir, &[0.1, 0.3])));
    session.apply(Command::PlayIndex(0));
    session.apply(Command::PlayIndex(1));
    assert!(settle(&mut session, playing));

    // Leave time for any earlier load to report back and be dropped.
    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        session.tick();
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(session.player().current_index(), Some(1));
    assert_eq!(session.chain().active_source_count(), 1);
    assert!(session.player().tracks()[0].duration.is_none());

    // 0.2 s: past the first track's length, inside the second's.
    render(&slot, 8_820);
    assert!(!session.chain().source_ended());
}

/// Plays samples but refuses to seek.
struct Unseekable(std::vec::IntoIter<f32>);

impl Iterator for Unseekable {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        self.0.next()
    }
}

impl Source for Unseekable {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[test]
fn restart_reloads_when_the_source_cannot_seek() {
    let (mut session, slot) = rendered_session();
    session.apply(Command::Add(vec![PathBuf::from("/music/a.mp3")]));
    session.apply(Command::CycleRepeat);
    session.apply(Command::CycleRepeat);
    session.apply(Command::Play);

    let generation = session.player().generation();
    session.handle_signal(Signal::Ready {
        generation,
        duration: None,
        source: Box::new(Unseekable(vec![0.5; 882].into_iter())),
    });
    session.process_events();
    assert!(session.chain().has_source());
    assert_eq!(session.player().transport(), Transport::Playing);

    render(&slot, 1_024);
    session.poll_source();
    session.process_events();

    assert_eq!(session.player().generation(), generation + 1);
    assert_eq!(session.player().load_state(), LoadState::Pending(generation + 1));
    assert!(session.player().state().is_playing);
    assert!(!session.chain().has_source());
}

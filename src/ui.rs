//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`. It only
//! reads session state; every change goes through `runtime::Command`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Sparkline, Wrap},
};
use std::time::Duration;

use crate::app::{LoadState, PlaybackState, Transport};
use crate::audio::{RepeatMode, SignalChain};
use crate::runtime::{EventLoopState, Session};

const CONTROLS: &[(&str, &str)] = &[
    ("j/k", "up/down"),
    ("enter", "play selected"),
    ("space/p", "play/pause"),
    ("h/l", "prev/next"),
    ("d", "remove"),
    ("s", "shuffle"),
    ("r", "repeat"),
    ("+/-", "volume"),
    ("m", "mute"),
    (",/.", "pan"),
    ("v/V", "reverb"),
    ("b/B", "bass"),
    ("tab", "eq band"),
    ("[/]", "eq gain"),
    ("q", "quit"),
];

fn controls_text() -> String {
    CONTROLS
        .iter()
        .map(|(k, v)| format!("[{k}] {v}"))
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn repeat_text(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "Repeat: Off",
        RepeatMode::All => "Repeat: All",
        RepeatMode::One => "Repeat: One",
    }
}

fn status_text(session: &Session) -> String {
    let player = session.player();
    let PlaybackState {
        is_shuffle,
        repeat_mode,
        ..
    } = player.state();

    let mut parts: Vec<String> = Vec::new();
    parts.push(
        match player.transport() {
            Transport::Empty => "Empty",
            Transport::Paused => "Paused",
            Transport::Playing => "Playing",
        }
        .to_string(),
    );

    if let Some(track) = player.current_track() {
        let elapsed = format_mmss(player.position());
        match track.duration {
            Some(total) => parts.push(format!("Song: {} [{elapsed} / {}]", track.title, format_mmss(total))),
            None => parts.push(format!("Song: {} [{elapsed}]", track.title)),
        }
        if track.album_art.is_some() {
            parts.push("Art".to_string());
        }
        if matches!(player.load_state(), LoadState::Pending(_)) {
            parts.push("Loading".to_string());
        }
    }

    parts.push(format!("Shuffle: {}", if is_shuffle { "ON" } else { "OFF" }));
    parts.push(repeat_text(repeat_mode).to_string());

    if let Some(msg) = session.status() {
        parts.push(format!("! {msg}"));
    }
    parts.join(" • ")
}

fn effects_lines(chain: &SignalChain, eq_focus: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let volume = format!("Volume  {:>3.0}%", chain.unmuted_volume() * 100.0);
    lines.push(if chain.is_muted() {
        format!("{volume} (muted)")
    } else {
        volume
    });

    let pan = chain.pan_angle();
    let pan_text = if pan.abs() < 0.005 {
        "C".to_string()
    } else if pan < 0.0 {
        format!("L {:.2}", -pan)
    } else {
        format!("R {pan:.2}")
    };
    lines.push(format!("Pan     {pan_text}"));
    lines.push(format!("Reverb  {:>3.0}%", chain.reverb_mix() * 100.0));
    lines.push(format!("Bass    {:+.1} dB", chain.bass_boost()));
    lines.push(String::new());

    for (i, (band, gain)) in chain.eq_gains().iter().enumerate() {
        let marker = if i == eq_focus { ">" } else { " " };
        let label = if *band >= 1000 {
            format!("{}k", band / 1000)
        } else {
            band.to_string()
        };
        lines.push(format!("{marker} {label:>4} Hz {gain:+5.1} dB"));
    }
    lines
}

/// Collapse `values` into `width` bars by averaging neighbouring bins.
pub fn downsample(values: &[u8], width: usize) -> Vec<u64> {
    if width == 0 || values.is_empty() {
        return Vec::new();
    }
    if values.len() <= width {
        return values.iter().map(|&v| u64::from(v)).collect();
    }
    (0..width)
        .map(|i| {
            let start = i * values.len() / width;
            let end = ((i + 1) * values.len() / width).max(start + 1);
            let bin = &values[start..end];
            bin.iter().map(|&v| u64::from(v)).sum::<u64>() / bin.len() as u64
        })
        .collect()
}

/// Scale a waveform summary to `0..=100` bars for the given width.
pub fn waveform_bars(summary: &[f32], width: usize) -> Vec<u64> {
    let peak = summary.iter().copied().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return vec![0; width.min(summary.len())];
    }
    let scaled: Vec<u8> = summary
        .iter()
        .map(|v| ((v / peak) * 100.0).round().clamp(0.0, 100.0) as u8)
        .collect();
    downsample(&scaled, width)
}

/// Render the entire UI into the provided `frame`.
pub fn draw(frame: &mut Frame, session: &Session, state: &EventLoopState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(4),
            Constraint::Length(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    // Status box
    let status = Paragraph::new(status_text(session))
        .block(
            Block::bordered()
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                })
                .title(" spatial-player ")
                .title_alignment(Alignment::Center),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);

    // Playlist
    {
        let player = session.player();
        let current = player.current_index();
        let items: Vec<ListItem> = player
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let marker = if Some(i) == current { "♪ " } else { "  " };
                let item = ListItem::new(format!("{marker}{}", t.title));
                if Some(i) == current {
                    item.style(Style::default().add_modifier(Modifier::BOLD))
                } else {
                    item
                }
            })
            .collect();
        let title = format!(" tracks ({}) ", items.len());
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut list_state = ListState::default();
        if !player.tracks().is_empty() {
            list_state.select(Some(state.selected));
        }
        frame.render_stateful_widget(list, middle[0], &mut list_state);
    }

    // Effects
    let effects = Paragraph::new(effects_lines(session.chain(), state.eq_focus).join("\n")).block(
        Block::bordered()
            .padding(Padding {
                left: 1,
                right: 0,
                top: 0,
                bottom: 0,
            })
            .title(" effects "),
    );
    frame.render_widget(effects, middle[1]);

    // Waveform of the current track
    let inner_width = chunks[2].width.saturating_sub(2) as usize;
    let waveform = session
        .player()
        .waveform()
        .map(|w| waveform_bars(w, inner_width))
        .unwrap_or_default();
    let waveform_widget = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(" waveform "))
        .data(&waveform)
        .max(100);
    frame.render_widget(waveform_widget, chunks[2]);

    // Live spectrum from the analysis tap
    let inner_width = chunks[3].width.saturating_sub(2) as usize;
    let spectrum = session
        .chain()
        .analysis_snapshot()
        .map(|s| downsample(&s.frequency, inner_width))
        .unwrap_or_default();
    let spectrum_widget = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(" spectrum "))
        .data(&spectrum)
        .max(255);
    frame.render_widget(spectrum_widget, chunks[3]);

    let footer = Paragraph::new(controls_text())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding {
                    left: 1,
                    right: 0,
                    top: 0,
                    bottom: 0,
                }),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);
}

//! Audio subsystem: the signal chain and the render graph it drives.
//!
//! `SignalChain` owns the effect topology and talks to an `AudioHost`; the
//! bundled `SoftwareHost` renders the graph in-process and feeds rodio.

mod analyser;
mod chain;
mod convolver;
mod dsp;
mod graph;
mod host;
mod software;
mod types;

pub use chain::{HostOpener, SignalChain};
pub use host::{AudioHost, HostError};
pub use software::SoftwareHost;
#[cfg(test)]
pub(crate) use software::Renderer;
pub use types::*;

#[cfg(test)]
mod tests;

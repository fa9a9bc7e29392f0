//! Application module: the playlist/transport controller and its state.
//!
//! `Player` lives in `app::player`; the value types it hands out (transport
//! flags, load state, emitted events) live in `app::model`.

mod model;
mod player;

pub use model::*;
pub use player::Player;

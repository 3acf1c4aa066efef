//! Game core — authoritative store, physics world, interaction resolution,
//! win condition, and chat-driven commands.
//!
//! The session in `session` owns one instance of everything and drives the
//! per-frame loop; the other modules are plain components that receive their
//! state explicitly.

pub mod commands;
pub mod interact;
pub mod physics;
pub mod session;
pub mod shape;
pub mod state;
pub mod win;

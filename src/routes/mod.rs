//! Route handlers for the command bridge.

pub mod chat;
pub mod player;
pub mod util;
pub mod world;

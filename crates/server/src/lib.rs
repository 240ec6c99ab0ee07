//! Concurrency gate around the world kernel.
//!
//! # Invariants
//! - Every mutating call, client or NPC tick, runs entirely inside one lock.
//! - A player only sees world changes through bundles on their session.
//! - Nothing under the lock blocks: bundle channels are unbounded.

pub mod command;
pub mod config;
mod hub;
pub mod server;

pub use command::{Command, ParseCommandError};
pub use config::{ConfigError, ServerConfig};
pub use server::{GameServer, ServerError, Session, Ticker};

pub fn crate_info() -> &'static str {
    concat!("spooky-server v", env!("CARGO_PKG_VERSION"))
}

#![deny(warnings)]

//! Turn resolution runtime for Startup Tycoon.
//!
//! [`engine`] is the pure quarter-to-quarter state transition. [`service`]
//! wires it to the SQLite store so that each resolved turn is committed as a
//! single atomic write.

pub mod config;
pub mod engine;
pub mod rpc;
pub mod service;

pub use config::{load_config, parse_config, ConfigError};
pub use engine::{
    resolve_turn, resolve_turn_detailed, run_quarters, starting_state, TurnError, TurnReport,
};
pub use rpc::{AdvanceTurnRequest, AdvanceTurnResult, Dashboard, Occupancy};
pub use service::{GameError, GameService, PreparedTurn};

//! Housie server - one live game behind HTTP and WebSocket
//!
//! Wraps [`housie_engine::GameEngine`] in a tokio task and exposes it to
//! the host's console and to read-only observers.
//!
//! # Architecture
//!
//! - **Runtime**: [`GameHost`] owns the engine; [`GameHandle`] queues work onto it
//! - **Timers**: [`TokioTimers`] turns engine timer requests into sleeps
//! - **Routes**: [`router`] maps HTTP verbs to engine operations
//! - **Observers**: `/ws` streams a snapshot, then every [`housie_engine::GameEvent`]
//! - **Config**: [`ServerConfig`] layers TOML, `HOUSIE_*` variables and CLI flags

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
mod config;
mod routes;
mod runtime;

// Crate-level exports - Configuration
pub use config::{ConfigError, HOST_ENV, HOST_TOKEN_ENV, PORT_ENV, ServerConfig};

// Crate-level exports - Runtime
pub use runtime::{
    ChannelBroadcaster, EVENT_BUFFER, GameHandle, GameHost, HostError, JOB_QUEUE_DEPTH, TokioClock,
    TokioTimers,
};

// Crate-level exports - HTTP surface
pub use routes::{
    ApiError, ApiJson, AppState, Caller, CountdownRequest, CreateGameRequest, ErrorBody,
    HOST_TOKEN_HEADER, PlayerRequest, SequenceInput, SequenceRequest, router,
};

//! Core types and trait seams for the Outrider command dispatcher.
//!
//! This crate defines the vocabulary of the system. All other crates depend
//! on `outrider-domain` and speak its types. No implementations live here.
//!
//! # Structure
//!
//! - `error`   — [`OutriderError`] and the crate [`Result`] alias
//! - `host`    — [`HostAndPort`] candidate targets
//! - `request` — [`RemoteRequest`], [`RemoteResponse`], [`OpHandle`]
//! - `pool`    — [`ConnectionPool`], [`Connection`] capability traits
//! - `baton`   — [`Baton`] completion execution contexts

mod baton;
mod error;
mod host;
mod pool;
mod request;

// --- error
pub use error::{OutriderError, Result};

// --- host
pub use host::HostAndPort;

// --- request
pub use request::{CommandOutcome, OpHandle, RemoteRequest, RemoteResponse};

// --- pool
pub use pool::{
    // ---
    Connection,
    ConnectionPool,
    ConnectionPtr,
    PoolPtr,
    PoolStats,
    ReclaimStatus,
};

// --- baton
pub use baton::{Baton, BatonPtr, InlineBaton, RuntimeBaton};

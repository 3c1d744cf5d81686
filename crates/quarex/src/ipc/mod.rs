//! Inter-process communication with quarex worker processes.
//!
//! This module provides the wire protocol, the readiness-wait primitive,
//! and the handle type for spawning and communicating with isolated
//! worker processes.

pub mod protocol;
pub mod readiness;
mod worker;

pub use protocol::{
    ErrorDescriptor, ExecutionRequest, ExecutionResponse, FailureKind, MatchOutcome, Operation,
    WIRE_VERSION, read_message, write_message,
};
pub use worker::WorkerHandle;

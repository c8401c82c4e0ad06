//! RPC client for the `rift` Thrift runtime.
//!
//! Sends `CALL`/`ONEWAY` messages over any protocol, decodes replies against
//! the schema, and surfaces declared exceptions, application errors, and
//! wire failures as distinct error types.

mod client;
mod error;

pub use client::RpcClient;
pub use error::{CallError, Result};

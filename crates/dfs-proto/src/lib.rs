//! dfs-proto: naming protocol types and validation
//!
//! This crate defines the newline-delimited JSON messages exchanged with
//! the naming server, and the commands the naming server sends to storage
//! nodes.

pub mod messages;
pub mod validation;

// Re-export key types
pub use messages::{
    decode_line, encode_line, CommandResponse, ErrorKind, RegisterRequest, Request, Response,
    StorageCommand,
};
pub use validation::*;

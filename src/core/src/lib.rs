//! Core library for thicket: the content-addressed object model, commit
//! engine, virtual-repo sync, upload/download pipelines, and the
//! capability-interface traits to the storage and RPC collaborators this
//! system assumes it is given (see [`store`] and [`rpc`]).
//!
//! This crate has no HTTP surface of its own — `thicket-server` wires
//! these pieces to actix-web request handlers.

pub mod constants;
pub mod core;
pub mod download;
pub mod error;
pub mod model;
pub mod rpc;
pub mod store;
pub mod upload;
pub mod util;

pub use error::{Result, ThicketError};

#![allow(missing_docs)]
//! TLS message types and their wire encodings.

#[macro_use]
mod macros;

pub mod alert;
pub mod base;
pub mod ccs;
pub mod codec;
pub mod deframer;
pub mod enums;
pub mod fragmenter;
pub mod handshake;
pub mod hsjoiner;
pub mod message;

#[cfg(test)]
mod handshake_test;

//! Core module containing the serial session engine
//!
//! This module provides:
//! - Transport layer (serial devices and an in-memory loopback)
//! - Port session lifecycle and line configuration
//! - Idle-timeout framing engine driven by a host tick
//! - ASCII/HEX codec for both directions
//! - Time sources, display sinks and the session transcript

pub mod clock;
pub mod codec;
pub mod port;
pub mod session;
pub mod sink;
pub mod transcript;
pub mod transport;

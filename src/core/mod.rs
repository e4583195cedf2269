//! Core Module - Protocol & Network Logic
//!
//! STOMP frame codec, the transport network graph and the monitor loop
//! that ties them to the event feed.

pub mod monitor;
pub mod stomp_frame;
pub mod transport_network;

pub use monitor::*;
pub use stomp_frame::*;
pub use transport_network::*;

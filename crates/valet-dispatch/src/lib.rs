//! Dispatcher: accepts app and robot connections, books bays and relays
//! orders and progress between them.

pub mod doctor;
pub mod registry;
pub mod server;

pub use registry::ClientRegistry;
pub use server::{serve, Dispatcher};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Listen address, e.g. "0.0.0.0:5000".
    pub bind: String,
    /// Robot handle that receives PARK/OUT orders.
    pub robot_handle: u32,
}

//! UDP protocol and session layer for PowerShades motorized window shade
//! controllers: frame codec, per-device session with availability tracking
//! and movement inference, broadcast discovery, and adaptive polling.

pub mod constants;
pub mod crc;
pub mod device;
pub mod discovery;
pub mod error;
pub mod liveness;
pub mod message;
pub mod movement;
pub mod packet;
pub mod scheduler;
pub mod transport;

pub use device::PowerShade;

//! Gain math applied per track before summation.

pub mod pan;

pub use pan::{pan_gains, route_gains, ChannelSelect, PanGains};

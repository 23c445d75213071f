//! Background tasks spawned at startup.

pub mod license_sweep;

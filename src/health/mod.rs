//! Instance health tracking. The prober writes health flags; the routing
//! core reads them when filtering instances.

pub mod monitor;

pub use monitor::HealthMonitor;

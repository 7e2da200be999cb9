pub mod connection;
pub mod health;
pub mod registry;
pub mod ring;

pub use connection::{ConnectionHandle, NodeConnection};
pub use health::HealthMonitor;
pub use registry::{NodeRegistry, SweepReport};
pub use ring::{HashRing, ReconcileOutcome};

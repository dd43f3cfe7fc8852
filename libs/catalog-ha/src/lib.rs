//! Migration locking and optional leader election (spec.md §4.6 / C6).

pub mod leader_election;
pub mod migration_lock;

pub use leader_election::{run_disabled, LeaderElectionConfig};
pub use migration_lock::{acquire, MigrationLock};

#[cfg(feature = "leader-election")]
pub use leader_election::run_with_lease;

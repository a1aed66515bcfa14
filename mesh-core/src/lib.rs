//! Pure mesh control-plane logic: Topology Builder, Configuration Provider,
//! and Port Allocator (spec §2). No Kubernetes client dependency — callers
//! hand in a `Snapshot` already fetched from listers and get back plain
//! data, which is what keeps this crate unit-testable without a cluster.

pub mod builder;
pub mod error;
pub mod filter;
pub mod key;
pub mod model;
pub mod ports;
pub mod provider;
pub mod snapshot;

pub use builder::build;
pub use error::{BuildError, EntityError, PortAllocError, RejectedServiceTrafficTarget};
pub use filter::ResourceFilter;
pub use key::{Key, ServiceTrafficTargetKey};
pub use model::Topology;
pub use ports::PortTable;
pub use provider::{provide, Config as ProviderConfig, ProviderIssue};
pub use snapshot::Snapshot;

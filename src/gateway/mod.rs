pub mod harbor;
pub mod provider;
pub mod snapshot;
pub mod types;

pub use harbor::{HarborConnector, HarborGateway};
pub use provider::{GatewayConnector, RegistryGateway};
pub use snapshot::{RegistrySnapshot, SnapshotConnector, SnapshotGateway};
pub use types::{CallDiagnostics, Operation};

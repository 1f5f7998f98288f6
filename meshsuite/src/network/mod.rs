//! Test networks and the services in them.

mod context;
mod service;

pub use context::{HostPortBindings, NetworkContext};
pub use service::{EndpointCheck, ExecOutput, ServiceContext};

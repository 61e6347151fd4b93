mod agent_env;
mod context;
mod error;
pub mod operations;
pub mod providers;
mod remote;
mod state;
pub mod steps;
pub mod traits;
mod wait;

#[cfg(test)]
pub mod mocks;

pub use context::CloudContext;
pub use error::{CloudError, Result};
pub use operations::Cloud;
pub use wait::TaskWaiter;

/// Maximum number of NICs a VM can carry.
pub const VM_NIC_LIMIT: u32 = 10;

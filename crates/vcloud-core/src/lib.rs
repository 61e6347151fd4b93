pub mod agent_env;
pub mod entity;
pub mod network;
pub mod params;
pub mod status;

pub use agent_env::*;
pub use entity::*;
pub use network::*;
pub use params::*;
pub use status::*;

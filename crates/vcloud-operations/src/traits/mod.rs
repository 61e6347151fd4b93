mod client;
mod iso;

pub use client::{ClientFactory, VcdClient};
pub use iso::{IsoImage, IsoImageBuilder};

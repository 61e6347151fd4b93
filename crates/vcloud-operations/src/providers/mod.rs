mod iso;

pub use iso::GenisoimageBuilder;

pub mod segment;
pub mod study;

pub use segment::*;
pub use study::*;

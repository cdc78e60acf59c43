pub mod convert;
pub mod share;
pub mod upload;

pub use convert::*;
pub use share::*;
pub use upload::*;

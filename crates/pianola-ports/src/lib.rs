pub mod omr;
pub mod storage;

pub use omr::*;
pub use storage::*;

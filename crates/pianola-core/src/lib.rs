pub mod jobs;
pub mod pipeline;
pub mod storage;

pub use jobs::*;
pub use pipeline::*;
pub use storage::*;

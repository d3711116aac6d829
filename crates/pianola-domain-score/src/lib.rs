pub mod model;
pub mod musicxml_import;
pub mod pitch;

pub use model::*;
pub use musicxml_import::*;
pub use pitch::*;

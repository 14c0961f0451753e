pub mod ifc;
pub mod step;

pub use crate::error::ParseError;
pub use ifc::StepDecoder;
pub use step::{StepEntity, StepFile, StepValue};

pub mod descriptor;
pub mod quantity;
pub mod selection;

pub use descriptor::{ModelDescriptor, ModelRecord, UploadResponse};
pub use quantity::{LevelQuantity, Levels, QuantityData, QuantityMetadata, QuantityRow};
pub use selection::SelectionSet;

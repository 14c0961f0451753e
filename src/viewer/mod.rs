pub mod adapter;
pub mod engine;
pub mod scene;

pub use adapter::{CancelToken, HighlightReport, IdMap, LoadTicket, ViewerAdapter, ViewerState};
pub use engine::{DecodedModel, ModelDecoder, ModelKey, SceneItem, SceneStorey, ViewerEngine};
pub use scene::{CameraPose, TerminalScene};

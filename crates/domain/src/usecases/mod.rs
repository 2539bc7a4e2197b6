//! Application use cases: the export reducer, its rerender policy and the
//! runtime that drives both

pub mod export;
pub mod rerender;
pub mod store;

pub use export::{
    AuthAction, Dependencies, Effect, ExportAction, ExportConfig, ExportFeature, ExportState,
    ImageLoadResponse, placeholder_size,
};
pub use rerender::RenderTrigger;
pub use store::ExportStore;

//! Deterministic, undoable image effect pipelines.

pub mod config;
pub mod effects;
pub mod history;
pub mod io;
pub mod pipeline;
pub mod preset;

pub use effects::{Catalog, EffectGroup, EffectKind, ParamSet, ParamValue};
pub use pipeline::{EffectInstance, Pipeline};
pub use preset::{EffectRecord, PipelineRecord};

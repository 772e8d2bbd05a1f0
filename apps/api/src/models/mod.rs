pub mod profile;
pub mod result;

pub use profile::{ContentDocument, Language, ProfileKey, SourceDocument};
pub use result::{PipelineResult, SplitMode, StageTiming};

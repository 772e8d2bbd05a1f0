pub mod orchestrator;
pub mod splitter;

pub use orchestrator::{ProfilePipeline, HTML_URL_TTL};

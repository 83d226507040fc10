pub mod config;
pub mod inflight;
pub mod normalize;
pub mod pipeline;
pub mod product;
pub mod ranking;
pub mod service;
pub mod summary;
pub mod synthesis;

pub use config::*;
pub use inflight::{normalize_key, InFlight, InFlightError};
pub use pipeline::{CitationGraphSource, LiteratureSource, ResearchPipeline, Sources, WebSource};
pub use product::assess_product;
pub use service::{ProductService, ResearchService};
pub use summary::derive_summary;
pub use synthesis::{fallback_recommendation, Synthesizer};

//! Data models and configuration.

pub mod config;
pub mod record;

pub use config::{
    DetectionConfig, ExtractionConfig, InvexConfig, PreprocessConfig, RecognitionConfig,
    RecognitionEngine,
};
pub use record::ExtractedRecord;

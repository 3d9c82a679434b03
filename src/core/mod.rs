//! Core classification pipeline stages

pub mod calibrate;
pub mod composite;
pub mod sample;
pub mod split;
pub mod classify;
pub mod accuracy;

// Re-export main types
pub use calibrate::{RadiometricScaler, ScaleGroup};
pub use composite::median_composite;
pub use sample::{SampleExtractor, Sampling, SkippedGeometry};
pub use split::{split_table, TableSplit};
pub use classify::{
    Classifier, RandomForestModel, RandomForestParams, RandomForestTrainer, CLASSIFICATION_BAND,
};
pub use accuracy::{AccuracyReport, ConfusionMatrix};

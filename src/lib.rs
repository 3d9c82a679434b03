//! terraclass: Supervised Land-Cover Classification for Multispectral Imagery
//!
//! This library implements an end-to-end land-cover classification pipeline
//! over in-memory rasters: radiometric correction of raw digital numbers to
//! physical units, median compositing of an image time series, training
//! sample extraction at labeled geometries, reproducible train/test
//! splitting, random forest classification of feature rows and whole
//! scenes, and confusion-matrix accuracy assessment.
//!
//! Every stage is a pure function over immutable inputs; transforms return
//! new values and never mutate their arguments.

pub mod types;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    Band, BandGrid, BandValue, BoundingBox, CoordinateSystem, FeatureRow, FeatureTable,
    Geometry, GeoTransform, LabeledGeometry, PipelineError, PipelineResult, Raster, NO_DATA,
};

pub use core::{
    median_composite, split_table, AccuracyReport, Classifier, ConfusionMatrix,
    RadiometricScaler, RandomForestModel, RandomForestParams, RandomForestTrainer,
    SampleExtractor, Sampling, ScaleGroup, SkippedGeometry, TableSplit, CLASSIFICATION_BAND,
};

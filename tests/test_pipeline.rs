//! End-to-end classification pipeline test on a synthetic Landsat-like scene

use terraclass::core::{
    median_composite, split_table, Classifier, ConfusionMatrix, RadiometricScaler,
    RandomForestTrainer, SampleExtractor, ScaleGroup, CLASSIFICATION_BAND,
};
use terraclass::types::{
    Band, BandGrid, CoordinateSystem, GeoTransform, Geometry, LabeledGeometry, Raster,
};

use ndarray::Array2;

const BANDS: [&str; 6] = ["SR_B1", "SR_B2", "SR_B3", "SR_B4", "SR_B5", "SR_B7"];
const CLASSES: [&str; 3] = ["urban", "forest", "agriculture"];

/// Raw digital number for a pixel: class signature plus band factor plus
/// deterministic per-pixel jitter
fn raw_dn(class: usize, band: usize, row: usize, col: usize) -> f32 {
    let base = match class {
        0 => 20000.0, // urban: bright
        1 => 9000.0,  // forest: dark
        _ => 14000.0, // agriculture: intermediate
    };
    let band_factor = 1.0 + band as f32 * 0.05;
    let jitter = ((row * 31 + col * 17) % 7) as f32 * 20.0;
    base * band_factor + jitter
}

/// Class of a scene row: three horizontal strips of 10 rows each
fn strip_class(row: usize) -> usize {
    row / 10
}

/// One raw 30x30 frame; `frame` perturbs values so the median has work to do
fn raw_frame(frame: usize) -> Raster {
    let bands = BANDS
        .iter()
        .enumerate()
        .map(|(b, name)| {
            let data: BandGrid = Array2::from_shape_fn((30, 30), |(r, c)| {
                raw_dn(strip_class(r), b, r, c) + frame as f32 * 15.0
            });
            Band::new(*name, data)
        })
        .collect();
    Raster::new(
        bands,
        GeoTransform::north_up(0.0, 300.0, 10.0),
        CoordinateSystem::Projected { epsg: 32633 },
    )
    .unwrap()
}

/// Ten labeled point geometries per class, at pixel centers inside each strip
fn training_points() -> Vec<LabeledGeometry> {
    let gt = GeoTransform::north_up(0.0, 300.0, 10.0);
    let mut points = Vec::new();
    for (class, label) in CLASSES.iter().enumerate() {
        for i in 0..10 {
            let row = class * 10 + (i % 5) * 2 + 1;
            let col = 3 + i * 2;
            let (x, y) = gt.pixel_center(row, col);
            points.push(LabeledGeometry::new(Geometry::Point { x, y }, *label));
        }
    }
    points
}

#[test]
fn test_full_classification_pipeline() {
    let _ = env_logger::builder().is_test(true).try_init();

    // Radiometric correction of each frame, then median composite
    let scaler = RadiometricScaler::new(vec![ScaleGroup::new(
        BANDS.iter().map(|s| s.to_string()).collect(),
        0.0000275,
        -0.2,
    )]);
    let frames: Vec<Raster> = (0..3)
        .map(|f| scaler.apply(&raw_frame(f)).unwrap())
        .collect();
    let composite = median_composite(&frames).unwrap();
    assert_eq!(composite.dim(), (30, 30));

    // Sample 30 labeled geometries
    let extractor = SampleExtractor::new(BANDS.iter().map(|s| s.to_string()).collect());
    let sampling = extractor.sample(&composite, &training_points()).unwrap();
    assert_eq!(sampling.table.len(), 30);
    assert!(sampling.skipped.is_empty());

    // Reproducible 80/20 split
    let split = split_table(&sampling.table, 42, 0.8).unwrap();
    assert_eq!(split.train.len() + split.test.len(), 30);
    assert!(
        (15..=29).contains(&split.train.len()),
        "train size {} far from 80% of 30",
        split.train.len()
    );
    assert!(!split.test.is_empty());

    // Train the forest and classify the held-out rows
    let trainer = RandomForestTrainer::seeded(10, 42);
    let model = trainer.train(&split.train).unwrap();
    let predicted = model.predict_rows(&split.test).unwrap();
    let actual: Vec<String> = split
        .test
        .rows
        .iter()
        .map(|r| r.label.clone().unwrap())
        .collect();

    // Confusion matrix over the test set
    let matrix = ConfusionMatrix::build(&actual, &predicted).unwrap();
    assert_eq!(matrix.total() as usize, split.test.len());
    assert!(matrix.labels().len() <= 3);
    for label in matrix.labels() {
        assert!(CLASSES.contains(&label.as_str()));
    }

    // The classes are well separated; the forest should do very well
    let overall = matrix.overall_accuracy();
    assert!(overall >= 0.8, "overall accuracy {} too low", overall);

    let report = matrix.report();
    let cell_sum: u64 = report.confusion_matrix.values().sum();
    assert_eq!(cell_sum, matrix.total());
}

#[test]
fn test_whole_scene_classification() {
    let _ = env_logger::builder().is_test(true).try_init();

    let scaler = RadiometricScaler::new(vec![ScaleGroup::new(
        BANDS.iter().map(|s| s.to_string()).collect(),
        0.0000275,
        -0.2,
    )]);
    let composite = median_composite(
        &(0..3)
            .map(|f| scaler.apply(&raw_frame(f)).unwrap())
            .collect::<Vec<_>>(),
    )
    .unwrap();

    let extractor = SampleExtractor::new(BANDS.iter().map(|s| s.to_string()).collect());
    let sampling = extractor.sample(&composite, &training_points()).unwrap();
    let model = RandomForestTrainer::seeded(10, 7)
        .train(&sampling.table)
        .unwrap();

    let classified = model.classify_raster(&composite).unwrap();
    assert_eq!(classified.dim(), (30, 30));
    let band = classified.band(CLASSIFICATION_BAND).unwrap();

    // Every pixel is valid, so every pixel gets a known class id
    let n_classes = model.labels().len() as f32;
    for &v in band.iter() {
        assert!(!v.is_nan());
        assert!(v >= 0.0 && v < n_classes);
    }

    // The strip interiors should be dominated by their own class
    let forest_id = model.class_id("forest").unwrap() as f32;
    let hits = (0..30)
        .filter(|&c| band[[15, c]] == forest_id)
        .count();
    assert!(hits >= 24, "only {}/30 forest pixels on the forest strip", hits);
}

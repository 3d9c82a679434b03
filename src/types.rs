use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued band data (surface reflectance, temperature, class ids)
pub type BandValue = f32;

/// 2D band data array (rows x columns)
pub type BandGrid = Array2<BandValue>;

/// No-data sentinel for band values
pub const NO_DATA: BandValue = f32::NAN;

/// True if a band value carries the no-data sentinel (NaN)
pub fn is_no_data(value: BandValue) -> bool {
    value.is_nan()
}

/// Coordinate system enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Geographic coordinates (latitude, longitude)
    Geographic,
    /// Projected coordinates (e.g., UTM)
    Projected { epsg: u32 },
}

/// Geospatial bounding box in world coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// Geospatial transformation parameters (north-up, zero rotation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64, // negative for north-up rasters
}

impl GeoTransform {
    /// North-up transform with square pixels of `pixel_size` world units
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_size: f64) -> Self {
        Self {
            top_left_x,
            pixel_width: pixel_size,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_size,
        }
    }

    /// Map world coordinates to fractional (row, col) grid coordinates
    pub fn world_to_grid(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.top_left_x) / self.pixel_width;
        let row = (y - self.top_left_y) / self.pixel_height;
        (row, col)
    }

    /// World coordinates of the center of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.top_left_x + (col as f64 + 0.5) * self.pixel_width;
        let y = self.top_left_y + (row as f64 + 0.5) * self.pixel_height;
        (x, y)
    }
}

/// One named spectral or thermal channel of a raster
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub name: String,
    pub data: BandGrid,
}

impl Band {
    pub fn new(name: impl Into<String>, data: BandGrid) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Multi-band raster over one shared spatial grid.
///
/// All bands share identical dimensions and geo-referencing. The value is
/// immutable after construction; every pipeline stage returns a new raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    bands: Vec<Band>,
    geo_transform: GeoTransform,
    coordinate_system: CoordinateSystem,
    acquired: Option<DateTime<Utc>>,
}

impl Raster {
    /// Build a raster, validating the shared-grid invariant
    pub fn new(
        bands: Vec<Band>,
        geo_transform: GeoTransform,
        coordinate_system: CoordinateSystem,
    ) -> PipelineResult<Self> {
        if bands.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Raster requires at least one band".to_string(),
            ));
        }
        if geo_transform.rotation_x != 0.0 || geo_transform.rotation_y != 0.0 {
            return Err(PipelineError::InvalidInput(
                "Only axis-aligned geo-transforms are supported".to_string(),
            ));
        }
        let dim = bands[0].data.dim();
        for band in &bands {
            if band.data.dim() != dim {
                return Err(PipelineError::InvalidInput(format!(
                    "Band '{}' has dimensions {:?}, expected {:?}",
                    band.name,
                    band.data.dim(),
                    dim
                )));
            }
        }
        for (i, band) in bands.iter().enumerate() {
            if bands[..i].iter().any(|b| b.name == band.name) {
                return Err(PipelineError::InvalidInput(format!(
                    "Duplicate band name '{}'",
                    band.name
                )));
            }
        }
        Ok(Self {
            bands,
            geo_transform,
            coordinate_system,
            acquired: None,
        })
    }

    /// Attach an acquisition timestamp (for time-series composites)
    pub fn with_acquired(mut self, acquired: DateTime<Utc>) -> Self {
        self.acquired = Some(acquired);
        self
    }

    /// (rows, cols) of the shared grid
    pub fn dim(&self) -> (usize, usize) {
        self.bands[0].data.dim()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// Look up a band's grid by name
    pub fn band(&self, name: &str) -> Option<&BandGrid> {
        self.bands.iter().find(|b| b.name == name).map(|b| &b.data)
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        &self.geo_transform
    }

    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    pub fn acquired(&self) -> Option<DateTime<Utc>> {
        self.acquired
    }

    /// World-coordinate extent of the grid
    pub fn extent(&self) -> BoundingBox {
        let (rows, cols) = self.dim();
        let gt = &self.geo_transform;
        let x0 = gt.top_left_x;
        let x1 = gt.top_left_x + cols as f64 * gt.pixel_width;
        let y0 = gt.top_left_y;
        let y1 = gt.top_left_y + rows as f64 * gt.pixel_height;
        BoundingBox {
            min_x: x0.min(x1),
            max_x: x0.max(x1),
            min_y: y0.min(y1),
            max_y: y0.max(y1),
        }
    }

    /// Pixel (row, col) containing the world point, if inside the grid
    pub fn pixel_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (rows, cols) = self.dim();
        let (frow, fcol) = self.geo_transform.world_to_grid(x, y);
        if frow < 0.0 || fcol < 0.0 {
            return None;
        }
        let (row, col) = (frow.floor() as usize, fcol.floor() as usize);
        if row >= rows || col >= cols {
            return None;
        }
        Some((row, col))
    }

    /// True if the two rasters share grid dimensions and geo-referencing
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.dim() == other.dim()
            && self.geo_transform == other.geo_transform
            && self.coordinate_system == other.coordinate_system
    }
}

/// A point or polygon training region in world coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Polygon { exterior: Vec<(f64, f64)> },
}

impl Geometry {
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Point { x, y } => BoundingBox {
                min_x: *x,
                max_x: *x,
                min_y: *y,
                max_y: *y,
            },
            Geometry::Polygon { exterior } => {
                let mut bbox = BoundingBox {
                    min_x: f64::INFINITY,
                    max_x: f64::NEG_INFINITY,
                    min_y: f64::INFINITY,
                    max_y: f64::NEG_INFINITY,
                };
                for &(x, y) in exterior {
                    bbox.min_x = bbox.min_x.min(x);
                    bbox.max_x = bbox.max_x.max(x);
                    bbox.min_y = bbox.min_y.min(y);
                    bbox.max_y = bbox.max_y.max(y);
                }
                bbox
            }
        }
    }

    /// Even-odd rule point-in-polygon test; points always return false
    pub fn contains(&self, px: f64, py: f64) -> bool {
        match self {
            Geometry::Point { .. } => false,
            Geometry::Polygon { exterior } => {
                let n = exterior.len();
                if n < 3 {
                    return false;
                }
                let mut inside = false;
                let mut j = n - 1;
                for i in 0..n {
                    let (xi, yi) = exterior[i];
                    let (xj, yj) = exterior[j];
                    if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
        }
    }
}

/// Training geometry tagged with its land-cover class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledGeometry {
    pub geometry: Geometry,
    pub label: String,
}

impl LabeledGeometry {
    pub fn new(geometry: Geometry, label: impl Into<String>) -> Self {
        Self {
            geometry,
            label: label.into(),
        }
    }
}

/// One sampled training/testing observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Band values, one per table band, in table band order
    pub values: Vec<BandValue>,
    /// Land-cover class, present for training/testing rows
    pub label: Option<String>,
    /// Uniform [0,1) key assigned by the dataset splitter
    pub random_key: Option<f64>,
    /// Index of the geometry this row was sampled from
    pub source_index: usize,
}

/// Ordered collection of feature rows with a fixed band list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub bands: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(bands: Vec<String>) -> Self {
        Self {
            bands,
            rows: Vec::new(),
        }
    }

    /// Append a row, enforcing the band-arity invariant
    pub fn push(&mut self, row: FeatureRow) -> PipelineResult<()> {
        if row.values.len() != self.bands.len() {
            return Err(PipelineError::InvalidInput(format!(
                "Row has {} values, table expects {}",
                row.values.len(),
                self.bands.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Error types for the classification pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn grid(rows: usize, cols: usize, value: f32) -> BandGrid {
        Array2::from_elem((rows, cols), value)
    }

    #[test]
    fn test_raster_rejects_mismatched_bands() {
        let bands = vec![
            Band::new("SR_B1", grid(4, 4, 0.1)),
            Band::new("SR_B2", grid(4, 5, 0.2)),
        ];
        let result = Raster::new(
            bands,
            GeoTransform::north_up(0.0, 120.0, 30.0),
            CoordinateSystem::Projected { epsg: 32633 },
        );
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_raster_rejects_duplicate_band_names() {
        let bands = vec![
            Band::new("SR_B1", grid(2, 2, 0.1)),
            Band::new("SR_B1", grid(2, 2, 0.2)),
        ];
        let result = Raster::new(
            bands,
            GeoTransform::north_up(0.0, 60.0, 30.0),
            CoordinateSystem::Geographic,
        );
        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn test_pixel_at_maps_world_to_grid() {
        let raster = Raster::new(
            vec![Band::new("SR_B1", grid(4, 4, 0.0))],
            GeoTransform::north_up(300.0, 600.0, 30.0),
            CoordinateSystem::Projected { epsg: 32633 },
        )
        .unwrap();

        // Top-left corner pixel
        assert_eq!(raster.pixel_at(301.0, 599.0), Some((0, 0)));
        // Pixel centers
        assert_eq!(raster.pixel_at(315.0, 585.0), Some((0, 0)));
        assert_eq!(raster.pixel_at(345.0, 555.0), Some((1, 1)));
        // Outside the 4x4 grid
        assert_eq!(raster.pixel_at(299.0, 585.0), None);
        assert_eq!(raster.pixel_at(301.0, 479.0), None);
    }

    #[test]
    fn test_polygon_contains() {
        let square = Geometry::Polygon {
            exterior: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
        };
        assert!(square.contains(5.0, 5.0));
        assert!(!square.contains(15.0, 5.0));
        assert!(!square.contains(-1.0, -1.0));
    }

    #[test]
    fn test_feature_table_arity_check() {
        let mut table = FeatureTable::new(vec!["SR_B1".to_string(), "SR_B2".to_string()]);
        let bad = FeatureRow {
            values: vec![0.1],
            label: Some("urban".to_string()),
            random_key: None,
            source_index: 0,
        };
        assert!(table.push(bad).is_err());
        let good = FeatureRow {
            values: vec![0.1, 0.2],
            label: Some("urban".to_string()),
            random_key: None,
            source_index: 0,
        };
        assert!(table.push(good).is_ok());
        assert_eq!(table.len(), 1);
    }
}

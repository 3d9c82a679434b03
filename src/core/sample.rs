use crate::types::{
    BandGrid, FeatureRow, FeatureTable, Geometry, LabeledGeometry, PipelineError, PipelineResult,
    Raster,
};

/// A geometry excluded from sampling, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedGeometry {
    pub index: usize,
    pub label: String,
    pub reason: String,
}

/// Result of sampling: the labeled feature table plus every skipped geometry
#[derive(Debug, Clone)]
pub struct Sampling {
    pub table: FeatureTable,
    pub skipped: Vec<SkippedGeometry>,
}

/// Extracts labeled feature rows from a raster at training geometries.
///
/// Points read the containing pixel. Polygons aggregate by the mean of the
/// pixels whose centers fall inside the polygon (even-odd rule), skipping
/// no-data observations per band. Geometries outside the raster extent, or
/// with no valid observation in any requested band, are skipped and
/// reported, never emitted with garbage values.
#[derive(Debug, Clone)]
pub struct SampleExtractor {
    bands: Vec<String>,
}

impl SampleExtractor {
    pub fn new(bands: Vec<String>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[String] {
        &self.bands
    }

    /// Produce one feature row per geometry that intersects valid data
    pub fn sample(
        &self,
        raster: &Raster,
        geometries: &[LabeledGeometry],
    ) -> PipelineResult<Sampling> {
        if self.bands.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Sample extractor requires at least one band".to_string(),
            ));
        }
        let grids: Vec<&BandGrid> = self
            .bands
            .iter()
            .map(|name| {
                raster.band(name).ok_or_else(|| {
                    PipelineError::InvalidInput(format!(
                        "Sample band '{}' not present in raster",
                        name
                    ))
                })
            })
            .collect::<PipelineResult<_>>()?;

        log::info!(
            "Sampling {} geometries over {} bands",
            geometries.len(),
            self.bands.len()
        );

        let mut table = FeatureTable::new(self.bands.clone());
        let mut skipped = Vec::new();

        for (index, labeled) in geometries.iter().enumerate() {
            match self.sample_one(raster, &grids, &labeled.geometry) {
                Some(values) => {
                    table.push(FeatureRow {
                        values,
                        label: Some(labeled.label.clone()),
                        random_key: None,
                        source_index: index,
                    })?;
                }
                None => {
                    let reason = "outside raster extent or no valid observations".to_string();
                    log::warn!(
                        "Skipping geometry {} ('{}'): {}",
                        index,
                        labeled.label,
                        reason
                    );
                    skipped.push(SkippedGeometry {
                        index,
                        label: labeled.label.clone(),
                        reason,
                    });
                }
            }
        }

        log::info!(
            "Sampled {} rows, skipped {} geometries",
            table.len(),
            skipped.len()
        );
        Ok(Sampling { table, skipped })
    }

    /// One scalar per band, or None if the geometry yields no valid sample
    fn sample_one(
        &self,
        raster: &Raster,
        grids: &[&BandGrid],
        geometry: &Geometry,
    ) -> Option<Vec<f32>> {
        match geometry {
            Geometry::Point { x, y } => {
                let (row, col) = raster.pixel_at(*x, *y)?;
                let values: Vec<f32> = grids.iter().map(|g| g[[row, col]]).collect();
                if values.iter().all(|v| v.is_nan()) {
                    return None;
                }
                Some(values)
            }
            Geometry::Polygon { .. } => {
                let bbox = geometry.bounding_box();
                if !bbox.intersects(&raster.extent()) {
                    return None;
                }

                // Restrict the scan to the polygon's bounding box
                let (rows, cols) = raster.dim();
                let gt = raster.geo_transform();
                let (r0, c0) = gt.world_to_grid(bbox.min_x, bbox.max_y);
                let (r1, c1) = gt.world_to_grid(bbox.max_x, bbox.min_y);
                let row_start = r0.min(r1).floor().max(0.0) as usize;
                let row_end = (r0.max(r1).ceil() as usize).min(rows);
                let col_start = c0.min(c1).floor().max(0.0) as usize;
                let col_end = (c0.max(c1).ceil() as usize).min(cols);

                let mut sums = vec![0.0f64; grids.len()];
                let mut counts = vec![0usize; grids.len()];
                for row in row_start..row_end {
                    for col in col_start..col_end {
                        let (x, y) = gt.pixel_center(row, col);
                        if !geometry.contains(x, y) {
                            continue;
                        }
                        for (i, grid) in grids.iter().enumerate() {
                            let v = grid[[row, col]];
                            if !v.is_nan() {
                                sums[i] += v as f64;
                                counts[i] += 1;
                            }
                        }
                    }
                }

                if counts.iter().all(|&c| c == 0) {
                    return None;
                }
                Some(
                    sums.iter()
                        .zip(&counts)
                        .map(|(&s, &c)| {
                            if c == 0 {
                                f32::NAN
                            } else {
                                (s / c as f64) as f32
                            }
                        })
                        .collect(),
                )
            }
        }
    }
}

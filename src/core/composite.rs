use crate::types::{Band, BandGrid, PipelineError, PipelineResult, Raster, NO_DATA};
use ndarray::Array2;

/// Median of the finite values in `samples`; NaN when none are finite.
/// Even counts average the two central values.
fn median(samples: &mut Vec<f32>) -> f32 {
    samples.retain(|v| v.is_finite());
    if samples.is_empty() {
        return NO_DATA;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = samples.len();
    if n % 2 == 1 {
        samples[n / 2]
    } else {
        (samples[n / 2 - 1] + samples[n / 2]) / 2.0
    }
}

/// Reduce a time series of same-grid rasters to one representative raster
/// by per-pixel, per-band median. No-data observations are ignored; a pixel
/// with no valid observation in any frame stays no-data.
pub fn median_composite(rasters: &[Raster]) -> PipelineResult<Raster> {
    if rasters.is_empty() {
        return Err(PipelineError::InvalidInput(
            "Composite requires at least one raster".to_string(),
        ));
    }

    let first = &rasters[0];
    let band_names = first.band_names();
    for (i, raster) in rasters.iter().enumerate().skip(1) {
        if !raster.same_grid(first) {
            return Err(PipelineError::InvalidInput(format!(
                "Raster {} does not share the composite grid",
                i
            )));
        }
        if raster.band_names() != band_names {
            return Err(PipelineError::InvalidInput(format!(
                "Raster {} has band list {:?}, expected {:?}",
                i,
                raster.band_names(),
                band_names
            )));
        }
    }

    log::info!(
        "Computing median composite of {} frames, {} bands",
        rasters.len(),
        band_names.len()
    );

    let (rows, cols) = first.dim();
    let mut bands = Vec::with_capacity(band_names.len());
    for name in &band_names {
        let grids: Vec<&BandGrid> = rasters
            .iter()
            .map(|r| r.band(name).ok_or_else(|| {
                PipelineError::Processing(format!("Band '{}' vanished from frame", name))
            }))
            .collect::<PipelineResult<_>>()?;

        let mut out = Array2::from_elem((rows, cols), NO_DATA);
        let mut samples = Vec::with_capacity(grids.len());
        for row in 0..rows {
            for col in 0..cols {
                samples.clear();
                samples.extend(grids.iter().map(|g| g[[row, col]]));
                out[[row, col]] = median(&mut samples);
            }
        }
        bands.push(Band::new(name.to_string(), out));
    }

    Raster::new(
        bands,
        first.geo_transform().clone(),
        first.coordinate_system().clone(),
    )
}

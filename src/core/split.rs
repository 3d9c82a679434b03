use crate::types::{FeatureTable, PipelineError, PipelineResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Disjoint train/test partition of a feature table
#[derive(Debug, Clone)]
pub struct TableSplit {
    pub train: FeatureTable,
    pub test: FeatureTable,
}

/// Partition a table into train/test subsets by a seeded uniform key.
///
/// Each row receives a key drawn uniformly from [0,1) in row order from a
/// `StdRng` seeded with `seed`; rows with `key < threshold` go to train,
/// the rest to test. Deterministic for a given seed and input order. A
/// threshold of 0 or 1 legitimately empties one side; the classifier
/// rejects empty training sets.
pub fn split_table(table: &FeatureTable, seed: u64, threshold: f64) -> PipelineResult<TableSplit> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PipelineError::InvalidInput(format!(
            "Split threshold {} outside [0, 1]",
            threshold
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = FeatureTable::new(table.bands.clone());
    let mut test = FeatureTable::new(table.bands.clone());

    for row in &table.rows {
        let key: f64 = rng.gen();
        let mut keyed = row.clone();
        keyed.random_key = Some(key);
        if key < threshold {
            train.push(keyed)?;
        } else {
            test.push(keyed)?;
        }
    }

    log::info!(
        "Split {} rows into {} train / {} test (threshold {})",
        table.len(),
        train.len(),
        test.len(),
        threshold
    );
    Ok(TableSplit { train, test })
}

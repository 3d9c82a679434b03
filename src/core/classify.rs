use crate::types::{
    Band, BandGrid, FeatureTable, PipelineError, PipelineResult, Raster, NO_DATA,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Name of the class band produced by whole-raster prediction
pub const CLASSIFICATION_BAND: &str = "classification";

/// Random forest training parameters
#[derive(Debug, Clone)]
pub struct RandomForestParams {
    /// Number of trees in the ensemble
    pub tree_count: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Features tried per split; defaults to ceil(sqrt(band count))
    pub mtry: Option<usize>,
    /// Bootstrap seed. Without one, training is only statistically
    /// reproducible (inherent to bagging).
    pub seed: Option<u64>,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            tree_count: 10,
            max_depth: 16,
            min_samples_leaf: 1,
            mtry: None,
            seed: None,
        }
    }
}

/// Interface for trainable classifiers, leaving room for model variants
pub trait Classifier {
    type Model;

    fn train(&self, table: &FeatureTable) -> PipelineResult<Self::Model>;
}

/// Trains a bagged ensemble of CART decision trees
#[derive(Debug, Clone)]
pub struct RandomForestTrainer {
    params: RandomForestParams,
}

impl RandomForestTrainer {
    pub fn new(params: RandomForestParams) -> Self {
        Self { params }
    }

    /// Forest of `tree_count` trees with a fixed seed, defaults otherwise
    pub fn seeded(tree_count: usize, seed: u64) -> Self {
        Self::new(RandomForestParams {
            tree_count,
            seed: Some(seed),
            ..Default::default()
        })
    }
}

impl Classifier for RandomForestTrainer {
    type Model = RandomForestModel;

    fn train(&self, table: &FeatureTable) -> PipelineResult<RandomForestModel> {
        if table.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Cannot train on an empty feature table".to_string(),
            ));
        }
        if table.bands.is_empty() {
            return Err(PipelineError::InvalidInput(
                "Training table has no bands".to_string(),
            ));
        }
        if self.params.tree_count == 0 {
            return Err(PipelineError::InvalidInput(
                "Tree count must be at least 1".to_string(),
            ));
        }

        // Dense class ids over the sorted label set
        let mut labels: Vec<String> = Vec::new();
        for (i, row) in table.rows.iter().enumerate() {
            let label = row.label.as_ref().ok_or_else(|| {
                PipelineError::InvalidInput(format!("Training row {} has no label", i))
            })?;
            if row.values.len() != table.bands.len() {
                return Err(PipelineError::InvalidInput(format!(
                    "Training row {} has {} values, expected {}",
                    i,
                    row.values.len(),
                    table.bands.len()
                )));
            }
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels.sort();

        let features: Vec<&[f32]> = table.rows.iter().map(|r| r.values.as_slice()).collect();
        let classes: Vec<usize> = table
            .rows
            .iter()
            .map(|r| {
                let label = r.label.as_ref().unwrap();
                labels.iter().position(|l| l == label).unwrap()
            })
            .collect();

        let n_features = table.bands.len();
        let mtry = self
            .params
            .mtry
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features);

        let master_seed = self.params.seed.unwrap_or_else(rand::random);
        let mut seed_rng = StdRng::seed_from_u64(master_seed);
        let tree_seeds: Vec<u64> = (0..self.params.tree_count)
            .map(|_| seed_rng.gen())
            .collect();

        log::info!(
            "Training random forest: {} trees, {} rows, {} classes, mtry={}",
            self.params.tree_count,
            table.len(),
            labels.len(),
            mtry
        );

        let builder = TreeBuilder {
            features: &features,
            classes: &classes,
            n_classes: labels.len(),
            n_features,
            mtry,
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
        };

        #[cfg(feature = "parallel")]
        let trees: Vec<DecisionTree> = tree_seeds
            .par_iter()
            .map(|&seed| builder.grow(seed))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let trees: Vec<DecisionTree> = tree_seeds
            .iter()
            .map(|&seed| builder.grow(seed))
            .collect();

        log::info!("Random forest training complete");
        Ok(RandomForestModel {
            bands: table.bands.clone(),
            labels,
            trees,
        })
    }
}

/// One node of a CART tree, stored in a flat arena
#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f32,
        /// Side missing (NaN) feature values fall to
        nan_left: bool,
        left: usize,
        right: usize,
    },
}

/// A single CART decision tree over dense class ids
#[derive(Debug, Clone)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Walk the tree from the root; NaN features follow the recorded side
    fn predict(&self, values: &[f32]) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    nan_left,
                    left,
                    right,
                } => {
                    let v = values[*feature];
                    let go_left = if v.is_nan() { *nan_left } else { v < *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Shared immutable context for growing one tree
struct TreeBuilder<'a> {
    features: &'a [&'a [f32]],
    classes: &'a [usize],
    n_classes: usize,
    n_features: usize,
    mtry: usize,
    max_depth: usize,
    min_samples_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    /// Grow one tree from a bootstrap resample drawn with `seed`
    fn grow(&self, seed: u64) -> DecisionTree {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = self.features.len();
        let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let mut nodes = Vec::new();
        self.grow_node(&sample, 0, &mut rng, &mut nodes);
        DecisionTree { nodes }
    }

    /// Recursively grow a subtree; returns the index of its root node
    fn grow_node(
        &self,
        rows: &[usize],
        depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let counts = self.class_counts(rows);
        let majority = argmax(&counts);

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.max_depth || rows.len() < 2 * self.min_samples_leaf {
            nodes.push(Node::Leaf { class: majority });
            return nodes.len() - 1;
        }

        match self.best_split(rows, rng) {
            Some((feature, threshold, nan_left)) => {
                let (left_rows, right_rows) = self.partition(rows, feature, threshold, nan_left);
                if left_rows.is_empty() || right_rows.is_empty() {
                    nodes.push(Node::Leaf { class: majority });
                    return nodes.len() - 1;
                }
                // Reserve the split slot before growing children
                let idx = nodes.len();
                nodes.push(Node::Leaf { class: majority });
                let left = self.grow_node(&left_rows, depth + 1, rng, nodes);
                let right = self.grow_node(&right_rows, depth + 1, rng, nodes);
                nodes[idx] = Node::Split {
                    feature,
                    threshold,
                    nan_left,
                    left,
                    right,
                };
                idx
            }
            None => {
                nodes.push(Node::Leaf { class: majority });
                nodes.len() - 1
            }
        }
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.classes[r]] += 1;
        }
        counts
    }

    /// Minimum weighted Gini impurity over a random mtry-subset of features
    /// and midpoint thresholds; None when no split reduces impurity
    fn best_split(&self, rows: &[usize], rng: &mut StdRng) -> Option<(usize, f32, bool)> {
        let parent_gini = gini(&self.class_counts(rows));

        // Sample mtry features without replacement
        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        for i in 0..self.mtry.min(candidates.len()) {
            let j = rng.gen_range(i..candidates.len());
            candidates.swap(i, j);
        }
        candidates.truncate(self.mtry);

        let mut best: Option<(usize, f32, bool, f64)> = None;
        for &feature in &candidates {
            let mut observed: Vec<(f32, usize)> = rows
                .iter()
                .filter_map(|&r| {
                    let v = self.features[r][feature];
                    (!v.is_nan()).then(|| (v, self.classes[r]))
                })
                .collect();
            if observed.len() < 2 {
                continue;
            }
            observed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
            let n_missing = rows.len() - observed.len();

            // Sweep left/right class counts across sorted values
            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = vec![0usize; self.n_classes];
            for &(_, c) in &observed {
                right_counts[c] += 1;
            }

            for i in 0..observed.len() - 1 {
                let (v, c) = observed[i];
                left_counts[c] += 1;
                right_counts[c] -= 1;
                let next = observed[i + 1].0;
                if next <= v {
                    continue; // duplicate value, no valid threshold here
                }
                let threshold = (v + next) / 2.0;

                let n_left = i + 1;
                let n_right = observed.len() - n_left;
                // Missing values route with the larger side
                let nan_left = n_left >= n_right;
                let total = (n_left + n_right + n_missing) as f64;
                let (w_left, w_right) = if nan_left {
                    ((n_left + n_missing) as f64, n_right as f64)
                } else {
                    (n_left as f64, (n_right + n_missing) as f64)
                };
                let weighted = (w_left * gini(&left_counts) + w_right * gini(&right_counts))
                    / total;

                if weighted < parent_gini - 1e-12
                    && best.map_or(true, |(_, _, _, b)| weighted < b)
                {
                    best = Some((feature, threshold, nan_left, weighted));
                }
            }
        }

        best.map(|(f, t, nl, _)| (f, t, nl))
    }

    fn partition(
        &self,
        rows: &[usize],
        feature: usize,
        threshold: f32,
        nan_left: bool,
    ) -> (Vec<usize>, Vec<usize>) {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for &r in rows {
            let v = self.features[r][feature];
            let go_left = if v.is_nan() { nan_left } else { v < threshold };
            if go_left {
                left.push(r);
            } else {
                right.push(r);
            }
        }
        (left, right)
    }
}

/// Gini impurity of a class count vector
fn gini(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Index of the largest count; ties break toward the smaller index
fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

/// Trained random forest: immutable, shareable across threads
#[derive(Debug, Clone)]
pub struct RandomForestModel {
    bands: Vec<String>,
    labels: Vec<String>,
    trees: Vec<DecisionTree>,
}

impl RandomForestModel {
    /// Class labels in dense-id order (the ids used in classified rasters)
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Dense class id of a label, if the model knows it
    pub fn class_id(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Majority vote over the ensemble; ties break toward the smaller id
    fn vote(&self, values: &[f32]) -> usize {
        let mut votes = vec![0usize; self.labels.len()];
        for tree in &self.trees {
            votes[tree.predict(values)] += 1;
        }
        argmax(&votes)
    }

    /// Predict one label per row of a feature table
    pub fn predict_rows(&self, table: &FeatureTable) -> PipelineResult<Vec<String>> {
        if table.bands != self.bands {
            return Err(PipelineError::InvalidInput(format!(
                "Table bands {:?} do not match model bands {:?}",
                table.bands, self.bands
            )));
        }
        Ok(table
            .rows
            .iter()
            .map(|row| self.labels[self.vote(&row.values)].clone())
            .collect())
    }

    /// Classify a whole raster into a single-band class-id raster.
    ///
    /// Pixels with no-data in any model band propagate to no-data
    /// (unclassified) in the output.
    pub fn classify_raster(&self, raster: &Raster) -> PipelineResult<Raster> {
        let grids: Vec<&BandGrid> = self
            .bands
            .iter()
            .map(|name| {
                raster.band(name).ok_or_else(|| {
                    PipelineError::InvalidInput(format!(
                        "Model band '{}' not present in raster",
                        name
                    ))
                })
            })
            .collect::<PipelineResult<_>>()?;

        let (rows, cols) = raster.dim();
        log::info!(
            "Classifying {}x{} raster with {} trees over {} bands",
            rows,
            cols,
            self.trees.len(),
            self.bands.len()
        );

        let classify_scanline = |row: usize| -> Vec<f32> {
            let mut line = Vec::with_capacity(cols);
            let mut values = vec![0.0f32; grids.len()];
            for col in 0..cols {
                let mut valid = true;
                for (i, grid) in grids.iter().enumerate() {
                    let v = grid[[row, col]];
                    if v.is_nan() {
                        valid = false;
                        break;
                    }
                    values[i] = v;
                }
                line.push(if valid {
                    self.vote(&values) as f32
                } else {
                    NO_DATA
                });
            }
            line
        };

        #[cfg(feature = "parallel")]
        let scanlines: Vec<Vec<f32>> = (0..rows).into_par_iter().map(classify_scanline).collect();

        #[cfg(not(feature = "parallel"))]
        let scanlines: Vec<Vec<f32>> = (0..rows).map(classify_scanline).collect();

        let flat: Vec<f32> = scanlines.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| PipelineError::Processing(format!("Shape error: {}", e)))?;

        Raster::new(
            vec![Band::new(CLASSIFICATION_BAND, data)],
            raster.geo_transform().clone(),
            raster.coordinate_system().clone(),
        )
    }
}

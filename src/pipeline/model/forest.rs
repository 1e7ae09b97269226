//! Random forest of CART classification trees
//!
//! Trees are grown on bootstrap samples with `mtry` candidate columns per
//! split and gini impurity. Per-tree seeds are drawn from the caller's RNG
//! before the parallel build, so a fixed seed gives the same forest
//! regardless of thread scheduling.

use faer::Mat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{validate_training, FitError};

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Columns considered per split; `None` means floor(sqrt(p))
    pub mtry: Option<usize>,
    /// Smallest number of samples a leaf may hold
    pub min_node_size: usize,
    pub max_depth: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            mtry: None,
            min_node_size: 1,
            max_depth: None,
        }
    }
}

impl ForestParams {
    pub fn resolved_mtry(&self, n_columns: usize) -> usize {
        self.mtry
            .unwrap_or_else(|| (n_columns as f64).sqrt().floor() as usize)
            .clamp(1, n_columns.max(1))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        prob: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One CART tree stored as a node arena, root at index 0
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

/// n * gini impurity of a node with `events` positives
#[inline]
fn weighted_gini(n: f64, events: f64) -> f64 {
    if n <= 0.0 {
        0.0
    } else {
        2.0 * events * (n - events) / n
    }
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `sample` (may contain duplicates).
    /// Impurity decreases are added to `importance`.
    fn grow(
        x: &Mat<f64>,
        y: &[u8],
        sample: Vec<usize>,
        params: &ForestParams,
        mtry: usize,
        rng: &mut StdRng,
        importance: &mut [f64],
    ) -> Self {
        let p = x.ncols();
        let mut nodes: Vec<Node> = vec![Node::Leaf { prob: 0.0 }];
        let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(0, sample, 0)];
        let mut columns: Vec<usize> = (0..p).collect();

        while let Some((node_id, rows, depth)) = stack.pop() {
            let n = rows.len();
            let events = rows.iter().filter(|&&r| y[r] == 1).count();
            let prob = if n == 0 { 0.0 } else { events as f64 / n as f64 };

            let depth_reached = params.max_depth.map_or(false, |d| depth >= d);
            if events == 0 || events == n || n < 2 * params.min_node_size || depth_reached {
                nodes[node_id] = Node::Leaf { prob };
                continue;
            }

            columns.shuffle(rng);
            let best = columns[..mtry]
                .iter()
                .filter_map(|&f| best_split_for_feature(x, y, &rows, f, events, params.min_node_size))
                .fold(None::<SplitCandidate>, |best, cand| match best {
                    Some(b) if b.decrease >= cand.decrease => Some(b),
                    _ => Some(cand),
                });

            let Some(split) = best else {
                nodes[node_id] = Node::Leaf { prob };
                continue;
            };

            importance[split.feature] += split.decrease;

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                rows.iter().partition(|&&r| x[(r, split.feature)] <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { prob: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { prob: 0.0 });
            nodes[node_id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Self { nodes }
    }

    /// Leaf probability for a row whose column values are given by `value`
    fn leaf_prob(&self, value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { prob } => return *prob,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if value(*feature) <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn predict_row(&self, x: &Mat<f64>, row: usize) -> f64 {
        self.leaf_prob(|j| x[(row, j)])
    }
}

/// Scan every threshold between distinct values of `feature`
fn best_split_for_feature(
    x: &Mat<f64>,
    y: &[u8],
    rows: &[usize],
    feature: usize,
    events: usize,
    min_node_size: usize,
) -> Option<SplitCandidate> {
    let mut values: Vec<(f64, u8)> = rows.iter().map(|&r| (x[(r, feature)], y[r])).collect();
    values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = values.len() as f64;
    let parent = weighted_gini(n, events as f64);
    let mut left_n = 0.0;
    let mut left_events = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for i in 0..values.len() - 1 {
        left_n += 1.0;
        left_events += f64::from(values[i].1);

        if values[i].0 == values[i + 1].0 {
            continue;
        }
        if (i + 1) < min_node_size || values.len() - (i + 1) < min_node_size {
            continue;
        }

        let right_n = n - left_n;
        let right_events = events as f64 - left_events;
        let decrease =
            parent - weighted_gini(left_n, left_events) - weighted_gini(right_n, right_events);

        if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
            best = Some(SplitCandidate {
                feature,
                threshold: (values[i].0 + values[i + 1].0) / 2.0,
                decrease,
            });
        }
    }

    best
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Out-of-bag rows per tree
    oob: Vec<Vec<usize>>,
    importance: Vec<f64>,
    pub mtry: usize,
}

impl RandomForest {
    pub fn fit(x: &Mat<f64>, y: &[u8], params: &ForestParams, rng: &mut StdRng) -> Result<Self, FitError> {
        validate_training(x, y)?;
        if params.n_trees == 0 || x.ncols() == 0 {
            return Err(FitError::InvalidHyperparameters(format!(
                "trees={} columns={}",
                params.n_trees,
                x.ncols()
            )));
        }

        let n = x.nrows();
        let p = x.ncols();
        let mtry = params.resolved_mtry(p);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| rng.gen()).collect();

        let grown: Vec<(DecisionTree, Vec<usize>, Vec<f64>)> = seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let sample: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();

                let mut in_bag = vec![false; n];
                for &r in &sample {
                    in_bag[r] = true;
                }
                let oob: Vec<usize> = (0..n).filter(|&r| !in_bag[r]).collect();

                let mut importance = vec![0.0; p];
                let tree = DecisionTree::grow(x, y, sample, params, mtry, &mut tree_rng, &mut importance);
                (tree, oob, importance)
            })
            .collect();

        let mut trees = Vec::with_capacity(grown.len());
        let mut oob = Vec::with_capacity(grown.len());
        let mut importance = vec![0.0; p];
        for (tree, tree_oob, tree_importance) in grown {
            for (total, value) in importance.iter_mut().zip(tree_importance) {
                *total += value;
            }
            trees.push(tree);
            oob.push(tree_oob);
        }
        let n_trees = trees.len() as f64;
        for value in &mut importance {
            *value /= n_trees;
        }

        Ok(Self {
            trees,
            oob,
            importance,
            mtry,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean leaf probability over trees
    pub fn predict_proba(&self, x: &Mat<f64>) -> Vec<f64> {
        let n_trees = self.trees.len() as f64;
        (0..x.nrows())
            .into_par_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|tree| tree.predict_row(x, row))
                    .sum::<f64>()
                    / n_trees
            })
            .collect()
    }

    /// Mean gini decrease per column
    pub fn impurity_importance(&self) -> &[f64] {
        &self.importance
    }

    /// Out-of-bag error rate of the ensemble
    pub fn oob_error(&self, x: &Mat<f64>, y: &[u8]) -> Option<f64> {
        let mut sums = vec![0.0; x.nrows()];
        let mut counts = vec![0usize; x.nrows()];
        for (tree, oob) in self.trees.iter().zip(&self.oob) {
            for &row in oob {
                sums[row] += tree.predict_row(x, row);
                counts[row] += 1;
            }
        }

        let scored: Vec<(f64, u8)> = (0..x.nrows())
            .filter(|&r| counts[r] > 0)
            .map(|r| (sums[r] / counts[r] as f64, y[r]))
            .collect();
        if scored.is_empty() {
            return None;
        }
        let wrong = scored
            .iter()
            .filter(|(prob, label)| u8::from(*prob > 0.5) != *label)
            .count();
        Some(wrong as f64 / scored.len() as f64)
    }

    /// Permutation importance per column group, measured on each tree's
    /// out-of-bag rows and scaled as mean / standard error over trees.
    ///
    /// `groups[j]` names the group of design-matrix column `j`; all columns of
    /// a group are permuted together so a one-hot block is scored as one
    /// feature. `x` and `y` must be the training data the forest was fitted on.
    pub fn permutation_importance(
        &self,
        x: &Mat<f64>,
        y: &[u8],
        groups: &[usize],
        n_groups: usize,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let seeds: Vec<u64> = (0..self.trees.len()).map(|_| rng.gen()).collect();

        let per_tree: Vec<Option<Vec<f64>>> = self
            .trees
            .par_iter()
            .zip(self.oob.par_iter())
            .zip(seeds.par_iter())
            .map(|((tree, oob), &seed)| {
                if oob.is_empty() {
                    return None;
                }
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let vote = |prob: f64| u8::from(prob > 0.5);

                let baseline = oob
                    .iter()
                    .filter(|&&row| vote(tree.predict_row(x, row)) == y[row])
                    .count() as f64;

                let drops = (0..n_groups)
                    .map(|g| {
                        let mut permuted = oob.clone();
                        permuted.shuffle(&mut tree_rng);
                        let correct = oob
                            .iter()
                            .zip(&permuted)
                            .filter(|(&row, &donor)| {
                                let prob = tree.leaf_prob(|j| {
                                    if groups[j] == g {
                                        x[(donor, j)]
                                    } else {
                                        x[(row, j)]
                                    }
                                });
                                vote(prob) == y[row]
                            })
                            .count() as f64;
                        (baseline - correct) / oob.len() as f64
                    })
                    .collect();
                Some(drops)
            })
            .collect();

        let scored: Vec<Vec<f64>> = per_tree.into_iter().flatten().collect();
        let t = scored.len() as f64;
        if scored.is_empty() {
            return vec![0.0; n_groups];
        }

        (0..n_groups)
            .map(|g| {
                let mean = scored.iter().map(|d| d[g]).sum::<f64>() / t;
                let var = if scored.len() > 1 {
                    scored.iter().map(|d| (d[g] - mean).powi(2)).sum::<f64>() / (t - 1.0)
                } else {
                    0.0
                };
                let se = (var / t).sqrt();
                mean / se.max(1e-8)
            })
            .collect()
    }
}

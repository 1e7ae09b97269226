//! Minority-class oversampling (SMOTE)
//!
//! Synthetic rows are placed between a minority row and one of its `k`
//! nearest minority neighbours. Indicator blocks (one-hot columns of a
//! categorical feature) are copied whole from whichever endpoint is closer,
//! so synthetic rows stay valid level codings.

use faer::Mat;
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::encode::EncodedData;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    /// Neighbours considered per minority row
    pub k: usize,
}

impl Default for Smote {
    fn default() -> Self {
        Self { k: 5 }
    }
}

fn squared_distance(x: &Mat<f64>, a: usize, b: usize) -> f64 {
    (0..x.ncols()).map(|j| (x[(a, j)] - x[(b, j)]).powi(2)).sum()
}

/// Groups whose columns only hold 0 or 1
fn indicator_groups(data: &EncodedData) -> Vec<bool> {
    let n_groups = data.groups.iter().max().map_or(0, |g| g + 1);
    let mut indicator = vec![true; n_groups];
    for (j, &g) in data.groups.iter().enumerate() {
        if indicator[g] && !(0..data.x.nrows()).all(|i| data.x[(i, j)] == 0.0 || data.x[(i, j)] == 1.0) {
            indicator[g] = false;
        }
    }
    indicator
}

impl Smote {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Indices of the `k` nearest other rows in `pool` for every row of `pool`
    fn neighbours(&self, x: &Mat<f64>, pool: &[usize]) -> Vec<Vec<usize>> {
        let k = self.k.min(pool.len() - 1);
        pool.par_iter()
            .map(|&row| {
                let mut dists: Vec<(f64, usize)> = pool
                    .iter()
                    .enumerate()
                    .filter(|(_, &other)| other != row)
                    .map(|(pos, &other)| (squared_distance(x, row, other), pos))
                    .collect();
                dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                dists.into_iter().take(k).map(|(_, pos)| pos).collect()
            })
            .collect()
    }

    /// Balance the classes by adding synthetic minority rows after the
    /// original rows. Balanced input is returned unchanged without touching
    /// the RNG.
    pub fn oversample(&self, data: &EncodedData, rng: &mut StdRng) -> EncodedData {
        let events = data.events();
        let non_events = data.n_rows() - events;
        if events == non_events || events == 0 || non_events == 0 {
            return data.clone();
        }

        let minority_label = u8::from(events < non_events);
        let minority: Vec<usize> = (0..data.n_rows())
            .filter(|&i| data.y[i] == minority_label)
            .collect();
        let n_new = events.max(non_events) - minority.len();

        if minority.len() < 2 || self.k == 0 {
            warn!(
                minority = minority.len(),
                k = self.k,
                "too few minority rows for SMOTE, training on the original rows"
            );
            return data.clone();
        }

        let neighbours = self.neighbours(&data.x, &minority);
        let indicator = indicator_groups(data);
        let n = data.n_rows();
        let p = data.x.ncols();

        let mut synthetic: Vec<Vec<f64>> = Vec::with_capacity(n_new);
        for _ in 0..n_new {
            let base_pos = rng.gen_range(0..minority.len());
            let near = &neighbours[base_pos];
            let neighbour = minority[near[rng.gen_range(0..near.len())]];
            let base = minority[base_pos];
            let gap: f64 = rng.gen();

            let row = (0..p)
                .map(|j| {
                    let (a, b) = (data.x[(base, j)], data.x[(neighbour, j)]);
                    if indicator[data.groups[j]] {
                        if gap < 0.5 {
                            a
                        } else {
                            b
                        }
                    } else {
                        a + gap * (b - a)
                    }
                })
                .collect();
            synthetic.push(row);
        }

        debug!(original = n, synthetic = n_new, "SMOTE oversampling");

        let x = Mat::from_fn(n + n_new, p, |i, j| {
            if i < n {
                data.x[(i, j)]
            } else {
                synthetic[i - n][j]
            }
        });
        let mut y = data.y.clone();
        y.extend(std::iter::repeat(minority_label).take(n_new));

        EncodedData {
            x,
            y,
            columns: data.columns.clone(),
            groups: data.groups.clone(),
        }
    }
}

//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression tree construction over second-order gradient
//! statistics, with deterministic tie-breaking between equal-gain splits.

use mergetime_core::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 regularisation on leaf weights
    pub lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 5,
            lambda: 1.0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain
            || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree using exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(features.len(), gradients.len());
        debug_assert_eq!(features.len(), hessians.len());

        let feature_count = features.first().map(Vec::len).unwrap_or(0);

        Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        }
    }

    /// Build tree and return nodes
    pub fn build(&self) -> Tree {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..self.features.len()).collect();

        self.build_node(&indices, 0, &mut nodes, 0);

        Tree::new(nodes)
    }

    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>, node_id: usize) -> i32 {
        let current_idx = nodes.len() as i32;
        let leaf_value = self.calculate_leaf_value(indices);

        if depth >= self.config.max_depth || indices.len() < 2 * self.config.min_samples_leaf.max(1) {
            nodes.push(Node::leaf(current_idx, leaf_value));
            return current_idx;
        }

        let split = match self.find_best_split(indices, node_id) {
            Some(s) if s.gain > 0.0 => s,
            _ => {
                nodes.push(Node::leaf(current_idx, leaf_value));
                return current_idx;
            }
        };

        let (left_indices, right_indices) =
            self.split_samples(indices, split.feature_idx, split.threshold);

        // Reserve space for current node
        nodes.push(Node::internal(
            current_idx,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, node_id * 2 + 1);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, node_id * 2 + 2);

        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Sweep each feature in sorted order and keep the best boundary
    fn find_best_split(&self, indices: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sum_gradients_hessians(indices);
        let parent_score = self.score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx]
                    .total_cmp(&self.features[b][feature_idx])
                    .then(a.cmp(&b))
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;
            let mut rank = 0usize;

            for pos in 0..order.len() - 1 {
                let idx = order[pos];
                g_left += self.gradients[idx];
                h_left += self.hessians[idx];

                let value = self.features[idx][feature_idx];
                let next = self.features[order[pos + 1]][feature_idx];
                if value == next {
                    continue;
                }
                rank += 1;

                let n_left = pos + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let gain = self.score(g_left, h_left)
                    + self.score(g_total - g_left, h_total - h_left)
                    - parent_score;

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold: value,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, rank, node_id),
                };

                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn split_samples(&self, indices: &[usize], feature_idx: usize, threshold: f64) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .partition(|&&idx| self.features[idx][feature_idx] <= threshold)
    }

    /// G^2 / (H + lambda)
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.config.lambda)
    }

    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &idx| {
            (g + self.gradients[idx], h + self.hessians[idx])
        })
    }

    /// Optimal leaf weight: -G / (H + lambda)
    fn calculate_leaf_value(&self, indices: &[usize]) -> f64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);
        let denom = sum_h + self.config.lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -sum_g / denom
    }
}

//! Tree-ensemble regression model
//!
//! The persisted model is an additive tree ensemble:
//! `bias + learning_rate * sum(tree(x))`. Gradient boosting, a random forest
//! (`bias = 0`, `learning_rate = 1 / n_trees`) or a constant predictor
//! (no trees) all fit this shape, so any of them can sit behind
//! [`crate::facade::Regressor`].
//!
//! # Model Format
//!
//! ```json
//! {
//!   "bias": 31.5,
//!   "feature_count": 3,
//!   "learning_rate": 0.1,
//!   "metadata": {},
//!   "trees": [
//!     {"nodes": [
//!       {"feature_idx": 0, "id": 0, "leaf": null, "left": 1, "right": 2, "threshold": 120.0},
//!       {"feature_idx": -1, "id": 1, "leaf": -8.0, "left": -1, "right": -1, "threshold": 0.0},
//!       {"feature_idx": -1, "id": 2, "leaf": 14.5, "left": -1, "right": -1, "threshold": 0.0}
//!     ]}
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{Model, MODEL_VERSION};
pub use tree::{Node, Tree};

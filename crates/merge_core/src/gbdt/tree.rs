//! Regression tree structures and traversal

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// Internal nodes have `feature_idx >= 0`, valid `left`/`right` child
/// indices and `leaf == None`. Leaves have `feature_idx == -1`,
/// `left == right == -1` and carry the prediction in `leaf`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Rows with `feature <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate on a feature vector whose width was checked by the caller
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        loop {
            let node = match self.nodes.get(idx) {
                Some(node) => node,
                None => return 0.0,
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let value = match features.get(node.feature_idx as usize) {
                Some(v) => *v,
                None => return 0.0,
            };

            idx = if value <= node.threshold {
                node.left as usize
            } else {
                node.right as usize
            };
        }
    }

    /// Check child links and feature indices against `feature_count`
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }

        let n = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    _ => return Err(format!("leaf {} has no finite value", i)),
                }
                continue;
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "node {} splits on feature {} outside width {}",
                    i, node.feature_idx, feature_count
                ));
            }
            // children are appended after their parent
            let i = i as i32;
            if node.left <= i || node.left >= n || node.right <= i || node.right >= n {
                return Err(format!("node {} has out-of-range children", i));
            }
        }
        Ok(())
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    1 + walk(nodes, node.left as usize).max(walk(nodes, node.right as usize))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, 10.0),
            Node::leaf(2, 20.0),
        ])
    }

    #[test]
    fn evaluates_both_branches() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0]), 10.0);
        assert_eq!(tree.evaluate(&[50.0]), 10.0);
        assert_eq!(tree.evaluate(&[51.0]), 20.0);
    }

    #[test]
    fn validation_catches_bad_feature() {
        let tree = stump();
        assert!(tree.validate(1).is_ok());
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn validation_catches_bad_children() {
        let tree = Tree::new(vec![Node::internal(0, 0, 1.0, 1, 7), Node::leaf(1, 0.0)]);
        assert!(tree.validate(1).is_err());
    }

    #[test]
    fn depth_of_stump_is_one() {
        assert_eq!(stump().depth(), 1);
        assert_eq!(Tree::new(vec![Node::leaf(0, 1.0)]).depth(), 0);
    }
}

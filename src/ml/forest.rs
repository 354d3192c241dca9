use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Random-forest regressor over one-hot feature rows.
///
/// Bagged variance-reduction trees: each tree fits a bootstrap resample of
/// the training rows and splits greedily on the binary column that most
/// reduces weighted variance. Deterministic for a fixed seed, and small
/// enough to serialize with bincode as the persisted model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestRegressor {
    trees: Vec<Tree>,
    n_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf { value: f64 },
    Split { feature: usize, left: usize, right: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        ForestParams {
            n_trees: 200,
            max_depth: 16,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

fn sum_squared_deviation(indices: &[usize], y: &[f64]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    let avg = mean(indices.iter().map(|&i| y[i]), indices.len());
    indices.iter().map(|&i| (y[i] - avg).powi(2)).sum()
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: ForestParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let leaf_value = mean(indices.iter().map(|&i| self.y[i]), indices.len());

        if depth >= self.params.max_depth || indices.len() < 2 * self.params.min_samples_leaf {
            return self.push(Node::Leaf { value: leaf_value });
        }

        let parent_sse = sum_squared_deviation(&indices, self.y);
        if parent_sse <= f64::EPSILON {
            return self.push(Node::Leaf { value: leaf_value });
        }

        let n_features = self.x[0].len();
        let mut best: Option<(usize, f64)> = None;
        for feature in 0..n_features {
            let (zeros, ones): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| self.x[i][feature] < 0.5);
            if zeros.len() < self.params.min_samples_leaf
                || ones.len() < self.params.min_samples_leaf
            {
                continue;
            }
            let child_sse =
                sum_squared_deviation(&zeros, self.y) + sum_squared_deviation(&ones, self.y);
            let reduction = parent_sse - child_sse;
            if reduction > best.map(|(_, r)| r).unwrap_or(1e-12) {
                best = Some((feature, reduction));
            }
        }

        let Some((feature, _)) = best else {
            return self.push(Node::Leaf { value: leaf_value });
        };

        let (zeros, ones): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[i][feature] < 0.5);

        let placeholder = self.push(Node::Leaf { value: leaf_value });
        let left = self.build(zeros, depth + 1);
        let right = self.build(ones, depth + 1);
        self.nodes[placeholder] = Node::Split { feature, left, right };
        placeholder
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

impl Tree {
    fn fit(x: &[Vec<f64>], y: &[f64], indices: Vec<usize>, params: ForestParams) -> Tree {
        let mut builder = TreeBuilder {
            x,
            y,
            params,
            nodes: Vec::new(),
        };
        builder.build(indices, 0);
        Tree {
            nodes: builder.nodes,
        }
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split { feature, left, right } => {
                    index = if row.get(*feature).copied().unwrap_or(0.0) < 0.5 {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

impl ForestRegressor {
    /// Fits a forest on one-hot rows. `x` must be rectangular and non-empty.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> anyhow::Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(anyhow::anyhow!(
                "training data shape mismatch: {} rows, {} targets",
                x.len(),
                y.len()
            ));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree::fit(x, y, sample, params)
            })
            .collect();

        Ok(ForestRegressor {
            trees,
            n_features: x[0].len(),
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|tree| tree.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

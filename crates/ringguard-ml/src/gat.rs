//! Graph attention layer with analytic gradients.
//!
//! Multi-head attention in the GATConv formulation:
//! - `z_j = W x_j` per head
//! - `e_ij = LeakyReLU(a_src . z_j + a_dst . z_i)` for every `j` in the
//!   neighborhood of `i` (self included)
//! - `alpha_ij = softmax_j(e_ij)`
//! - `out_i = concat_h(sum_j alpha_ij z_j) + bias`

use rand::Rng;
use ringguard_core::error::{Result, RingGuardError};
use serde::{Deserialize, Serialize};

/// One graph attention layer with concatenated heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatLayer {
    /// Input feature width.
    pub in_dim: usize,
    /// Output width per head.
    pub out_dim: usize,
    /// Number of attention heads.
    pub heads: usize,
    /// Negative slope of the attention LeakyReLU.
    pub negative_slope: f64,
    /// Projection per head, `in_dim x out_dim`.
    pub weights: Vec<Vec<Vec<f64>>>,
    /// Source attention vector per head.
    pub att_src: Vec<Vec<f64>>,
    /// Target attention vector per head.
    pub att_dst: Vec<Vec<f64>>,
    /// Bias over the concatenated output.
    pub bias: Vec<f64>,
}

/// Intermediate values of a forward pass, kept for backprop.
#[derive(Debug, Clone)]
pub(crate) struct GatCache {
    input: Vec<Vec<f64>>,
    /// `[head][node][c]`
    projected: Vec<Vec<Vec<f64>>>,
    /// Pre-LeakyReLU attention logits, `[head][node][neighbor]`.
    scores: Vec<Vec<Vec<f64>>>,
    /// Attention coefficients, `[head][node][neighbor]`.
    pub(crate) alpha: Vec<Vec<Vec<f64>>>,
}

impl GatLayer {
    /// Glorot-uniform weights and attention vectors, zero bias.
    pub fn glorot<R: Rng>(
        in_dim: usize,
        out_dim: usize,
        heads: usize,
        negative_slope: f64,
        rng: &mut R,
    ) -> Self {
        let w_bound = (6.0 / (in_dim + heads * out_dim).max(1) as f64).sqrt();
        let a_bound = (6.0 / (heads + out_dim).max(1) as f64).sqrt();

        let weights = (0..heads)
            .map(|_| {
                (0..in_dim)
                    .map(|_| {
                        (0..out_dim)
                            .map(|_| rng.random_range(-w_bound..=w_bound))
                            .collect()
                    })
                    .collect()
            })
            .collect();
        let attention = |rng: &mut R| -> Vec<Vec<f64>> {
            (0..heads)
                .map(|_| {
                    (0..out_dim)
                        .map(|_| rng.random_range(-a_bound..=a_bound))
                        .collect()
                })
                .collect()
        };
        let att_src = attention(rng);
        let att_dst = attention(rng);

        Self {
            in_dim,
            out_dim,
            heads,
            negative_slope,
            weights,
            att_src,
            att_dst,
            bias: vec![0.0; heads * out_dim],
        }
    }

    /// A layer of the same shape with every parameter zero.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self {
            in_dim: self.in_dim,
            out_dim: self.out_dim,
            heads: self.heads,
            negative_slope: self.negative_slope,
            weights: vec![vec![vec![0.0; self.out_dim]; self.in_dim]; self.heads],
            att_src: vec![vec![0.0; self.out_dim]; self.heads],
            att_dst: vec![vec![0.0; self.out_dim]; self.heads],
            bias: vec![0.0; self.heads * self.out_dim],
        }
    }

    /// Check the declared dimensions and every tensor against the expected
    /// shape.
    pub fn validate_shape(&self, in_dim: usize, out_dim: usize, heads: usize) -> Result<()> {
        let same = |expected: usize, actual: usize| {
            if expected == actual {
                Ok(())
            } else {
                Err(RingGuardError::DimensionMismatch { expected, actual })
            }
        };

        same(in_dim, self.in_dim)?;
        same(out_dim, self.out_dim)?;
        same(heads, self.heads)?;
        same(heads, self.weights.len())?;
        for projection in &self.weights {
            same(in_dim, projection.len())?;
            for row in projection {
                same(out_dim, row.len())?;
            }
        }
        for att in [&self.att_src, &self.att_dst] {
            same(heads, att.len())?;
            for vector in att {
                same(out_dim, vector.len())?;
            }
        }
        same(heads * out_dim, self.bias.len())
    }

    /// Width of the concatenated output.
    #[must_use]
    pub fn output_dim(&self) -> usize {
        self.heads * self.out_dim
    }

    /// Parameters in a fixed order.
    pub fn params(&self) -> impl Iterator<Item = &f64> {
        self.weights
            .iter()
            .flatten()
            .flatten()
            .chain(self.att_src.iter().flatten())
            .chain(self.att_dst.iter().flatten())
            .chain(self.bias.iter())
    }

    /// Mutable parameters, same order as [`GatLayer::params`].
    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.weights
            .iter_mut()
            .flatten()
            .flatten()
            .chain(self.att_src.iter_mut().flatten())
            .chain(self.att_dst.iter_mut().flatten())
            .chain(self.bias.iter_mut())
    }

    /// Forward pass. `neighborhoods[i]` lists the nodes `i` attends to.
    pub(crate) fn forward(
        &self,
        input: &[Vec<f64>],
        neighborhoods: &[Vec<usize>],
    ) -> (Vec<Vec<f64>>, GatCache) {
        let n = input.len();
        let mut output = vec![self.bias.clone(); n];
        let mut projected = Vec::with_capacity(self.heads);
        let mut scores = Vec::with_capacity(self.heads);
        let mut alpha = Vec::with_capacity(self.heads);

        for h in 0..self.heads {
            let z: Vec<Vec<f64>> = input
                .iter()
                .map(|x| linear_transform(x, &self.weights[h], self.out_dim))
                .collect();
            let src: Vec<f64> = z.iter().map(|zj| dot(zj, &self.att_src[h])).collect();
            let dst: Vec<f64> = z.iter().map(|zi| dot(zi, &self.att_dst[h])).collect();

            let offset = h * self.out_dim;
            let mut head_scores = Vec::with_capacity(n);
            let mut head_alpha = Vec::with_capacity(n);

            for (i, nbrs) in neighborhoods.iter().enumerate() {
                let s: Vec<f64> = nbrs.iter().map(|&j| src[j] + dst[i]).collect();
                let e: Vec<f64> = s.iter().map(|&v| leaky_relu(v, self.negative_slope)).collect();
                let a = softmax(&e);

                for (k, &j) in nbrs.iter().enumerate() {
                    for c in 0..self.out_dim {
                        output[i][offset + c] += a[k] * z[j][c];
                    }
                }

                head_scores.push(s);
                head_alpha.push(a);
            }

            projected.push(z);
            scores.push(head_scores);
            alpha.push(head_alpha);
        }

        let cache = GatCache {
            input: input.to_vec(),
            projected,
            scores,
            alpha,
        };
        (output, cache)
    }

    /// Backward pass.
    ///
    /// Adds parameter gradients into `grads` and returns the gradient with
    /// respect to the layer input.
    #[allow(clippy::needless_range_loop)]
    pub(crate) fn backward(
        &self,
        cache: &GatCache,
        neighborhoods: &[Vec<usize>],
        grad_output: &[Vec<f64>],
        grads: &mut GatLayer,
    ) -> Vec<Vec<f64>> {
        let n = grad_output.len();
        let mut grad_input = vec![vec![0.0; self.in_dim]; n];

        for g in grad_output {
            for (b, &v) in grads.bias.iter_mut().zip(g) {
                *b += v;
            }
        }

        for h in 0..self.heads {
            let z = &cache.projected[h];
            let offset = h * self.out_dim;
            let mut dz = vec![vec![0.0; self.out_dim]; n];
            let mut d_src = vec![0.0; n];
            let mut d_dst = vec![0.0; n];

            for (i, nbrs) in neighborhoods.iter().enumerate() {
                let go = &grad_output[i][offset..offset + self.out_dim];
                let alpha = &cache.alpha[h][i];
                let scores = &cache.scores[h][i];

                let mut d_alpha = Vec::with_capacity(nbrs.len());
                for (k, &j) in nbrs.iter().enumerate() {
                    for c in 0..self.out_dim {
                        dz[j][c] += alpha[k] * go[c];
                    }
                    d_alpha.push(dot(go, &z[j]));
                }

                // Softmax and LeakyReLU
                let weighted: f64 = alpha.iter().zip(&d_alpha).map(|(a, d)| a * d).sum();
                for (k, &j) in nbrs.iter().enumerate() {
                    let de = alpha[k] * (d_alpha[k] - weighted);
                    let ds = if scores[k] > 0.0 {
                        de
                    } else {
                        self.negative_slope * de
                    };
                    d_src[j] += ds;
                    d_dst[i] += ds;
                }
            }

            for j in 0..n {
                for c in 0..self.out_dim {
                    dz[j][c] += d_src[j] * self.att_src[h][c] + d_dst[j] * self.att_dst[h][c];
                    grads.att_src[h][c] += d_src[j] * z[j][c];
                    grads.att_dst[h][c] += d_dst[j] * z[j][c];
                }
            }

            for i in 0..n {
                for f in 0..self.in_dim {
                    let x = cache.input[i][f];
                    for c in 0..self.out_dim {
                        grads.weights[h][f][c] += x * dz[i][c];
                        grad_input[i][f] += self.weights[h][f][c] * dz[i][c];
                    }
                }
            }
        }

        grad_input
    }
}

/// Neighborhoods for attention: each node followed by its neighbors.
#[must_use]
pub fn neighborhoods_with_self(neighbors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    neighbors
        .iter()
        .enumerate()
        .map(|(i, nbrs)| {
            let mut hood = Vec::with_capacity(nbrs.len() + 1);
            hood.push(i);
            hood.extend(nbrs.iter().copied().filter(|&j| j != i));
            hood
        })
        .collect()
}

fn linear_transform(input: &[f64], weights: &[Vec<f64>], out_dim: usize) -> Vec<f64> {
    let mut output = vec![0.0; out_dim];
    for (&x, row) in input.iter().zip(weights) {
        for (o, &w) in output.iter_mut().zip(row) {
            *o += x * w;
        }
    }
    output
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn leaky_relu(x: f64, slope: f64) -> f64 {
    if x > 0.0 { x } else { slope * x }
}

fn softmax(x: &[f64]) -> Vec<f64> {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = x.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.iter().map(|e| e / sum).collect()
}

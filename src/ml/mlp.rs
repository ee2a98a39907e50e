// ============================================================
// Layer 5 — Feed-Forward Block
// ============================================================
// The position-wise MLP inside every encoder layer:
//
//   x ──► Dense(dim_mlp) ──► GELU ──► Dropout ──► Dense(dim_model) ──► Dropout ──► y
//
// Output width always equals `dim_model`, so the block can sit
// behind a residual connection.
//
// Dropout here is driven by an explicit flag and an RNG passed
// in by the caller instead of Burn's autodiff-mode switch:
//   deterministic = true   → dropout is the identity
//   deterministic = false  → two independent inverted-dropout
//                            masks drawn from `rng`
// Given the same RNG state the masks are reproducible.
//
// Reference: Burn Book §3 (Building Blocks, Config and Module)
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::gelu,
};
use rand::Rng;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Width of the token representation (input and output)
    pub dim_model:    usize,
    /// Hidden width of the expansion layer
    pub dim_mlp:      usize,
    #[config(default = 0.1)]
    pub dropout_rate: f64,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        Mlp {
            expand:       LinearConfig::new(self.dim_model, self.dim_mlp).init(device),
            project:      LinearConfig::new(self.dim_mlp, self.dim_model).init(device),
            dropout_rate: self.dropout_rate,
        }
    }
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub expand:       Linear<B>,
    pub project:      Linear<B>,
    pub dropout_rate: f64,
}

impl<B: Backend> Mlp<B> {
    /// `[.., dim_model]` → `[.., dim_model]`
    pub fn forward<const D: usize, R: Rng + ?Sized>(
        &self,
        input:         Tensor<B, D>,
        deterministic: bool,
        rng:           &mut R,
    ) -> Tensor<B, D> {
        let x = gelu(self.expand.forward(input));
        let x = dropout(x, self.dropout_rate, deterministic, rng);
        let x = self.project.forward(x);
        dropout(x, self.dropout_rate, deterministic, rng)
    }
}

/// Inverted dropout: zero each element with probability `rate`
/// and scale the survivors by `1 / (1 - rate)`.
pub(crate) fn dropout<B: Backend, const D: usize, R: Rng + ?Sized>(
    x:             Tensor<B, D>,
    rate:          f64,
    deterministic: bool,
    rng:           &mut R,
) -> Tensor<B, D> {
    if deterministic || rate <= 0.0 {
        return x;
    }
    let keep  = 1.0 - rate;
    let scale = (1.0 / keep) as f32;
    let dims  = x.dims();
    let count: usize = dims.iter().product();

    let mask: Vec<f32> = (0..count)
        .map(|_| if rng.gen::<f64>() < keep { scale } else { 0.0 })
        .collect();
    let mask = Tensor::<B, D>::from_data(TensorData::new(mask, dims), &x.device());
    x * mask
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn input(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 3> {
        Tensor::random([2, 5, 16], burn::tensor::Distribution::Default, device)
    }

    #[test]
    fn test_default_dropout_rate() {
        assert_eq!(MlpConfig::new(8, 32).dropout_rate, 0.1);
    }

    #[test]
    fn test_output_width_is_dim_model() {
        let device = Default::default();
        let mlp    = MlpConfig::new(16, 64).init::<TestBackend>(&device);
        let mut rng = StdRng::seed_from_u64(0);

        let out = mlp.forward(input(&device), false, &mut rng);
        assert_eq!(out.dims(), [2, 5, 16]);

        let flat = Tensor::<TestBackend, 2>::zeros([7, 16], &device);
        assert_eq!(mlp.forward(flat, true, &mut rng).dims(), [7, 16]);
    }

    #[test]
    fn test_deterministic_is_repeatable() {
        let device = Default::default();
        let mlp    = MlpConfig::new(16, 64).with_dropout_rate(0.5).init::<TestBackend>(&device);
        let x      = input(&device);

        let a = to_vec(mlp.forward(x.clone(), true, &mut StdRng::seed_from_u64(1)));
        let b = to_vec(mlp.forward(x, true, &mut StdRng::seed_from_u64(2)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_stochastic_outputs_differ() {
        let device  = Default::default();
        let mlp     = MlpConfig::new(16, 64).with_dropout_rate(0.5).init::<TestBackend>(&device);
        let x       = input(&device);
        let mut rng = StdRng::seed_from_u64(3);

        let a = to_vec(mlp.forward(x.clone(), false, &mut rng));
        let b = to_vec(mlp.forward(x, false, &mut rng));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_rng_state_same_masks() {
        let device = Default::default();
        let mlp    = MlpConfig::new(16, 64).with_dropout_rate(0.3).init::<TestBackend>(&device);
        let x      = input(&device);

        let a = to_vec(mlp.forward(x.clone(), false, &mut StdRng::seed_from_u64(9)));
        let b = to_vec(mlp.forward(x, false, &mut StdRng::seed_from_u64(9)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_dropout_zeroes_and_rescales() {
        let device  = Default::default();
        let ones    = Tensor::<TestBackend, 1>::ones([1000], &device);
        let mut rng = StdRng::seed_from_u64(0);

        let out = to_vec(dropout(ones, 0.5, false, &mut rng));
        assert!(out.iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
        let kept = out.iter().filter(|&&v| v > 0.0).count();
        assert!((350..650).contains(&kept), "kept {kept}");
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let device  = Default::default();
        let x       = input(&device);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(to_vec(dropout(x.clone(), 0.0, false, &mut rng)), to_vec(x));
    }
}

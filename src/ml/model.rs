use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::{MseLoss, Reduction},
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use rand::Rng;

use crate::data::batcher::FlowBatch;
use crate::domain::config::ExperimentConfig;
use crate::ml::mlp::{dropout, Mlp, MlpConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct VitRegressorConfig {
    pub nx:           usize,
    pub ny:           usize,
    pub patch_size:   usize,
    pub in_channels:  usize,
    pub out_channels: usize,
    pub num_layers:   usize,
    pub num_heads:    usize,
    pub dim_model:    usize,
    pub dim_mlp:      usize,
    #[config(default = 0.1)]
    pub dropout_rate: f64,
}

impl VitRegressorConfig {
    pub fn from_experiment(cfg: &ExperimentConfig) -> Self {
        let vit = &cfg.vit;
        Self::new(
            vit.img_size[0],
            vit.img_size[1],
            vit.patch_size,
            vit.in_channels,
            vit.out_channels,
            vit.num_layers,
            vit.num_heads,
            vit.dim_model,
            vit.dim_mlp,
        )
        .with_dropout_rate(vit.dropout_rate)
    }

    pub fn num_patches(&self) -> usize {
        (self.nx / self.patch_size) * (self.ny / self.patch_size)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> VitRegressor<B> {
        let patch_area = self.patch_size * self.patch_size;

        let patch_embedding    = LinearConfig::new(patch_area * self.in_channels, self.dim_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.num_patches(), self.dim_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.dim_model).init(device);
        let head       = LinearConfig::new(self.dim_model, patch_area * self.out_channels).init(device);

        VitRegressor {
            patch_embedding, position_embedding, layers, final_norm, head,
            nx:           self.nx,
            ny:           self.ny,
            patch_size:   self.patch_size,
            out_channels: self.out_channels,
            dropout_rate: self.dropout_rate,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        // Attention dropout is applied explicitly so it follows the
        // deterministic flag rather than the autodiff mode.
        let self_attn = MultiHeadAttentionConfig::new(self.dim_model, self.num_heads)
            .with_dropout(0.0)
            .init(device);
        let mlp   = MlpConfig::new(self.dim_model, self.dim_mlp)
            .with_dropout_rate(self.dropout_rate)
            .init(device);
        let norm1 = LayerNormConfig::new(self.dim_model).init(device);
        let norm2 = LayerNormConfig::new(self.dim_model).init(device);
        EncoderBlock { self_attn, mlp, norm1, norm2, dropout_rate: self.dropout_rate }
    }
}

/// Pre-norm encoder layer: attention and MLP each behind a residual.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:    MultiHeadAttention<B>,
    pub mlp:          Mlp<B>,
    pub norm1:        LayerNorm<B>,
    pub norm2:        LayerNorm<B>,
    pub dropout_rate: f64,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward<R: Rng + ?Sized>(
        &self,
        x:             Tensor<B, 3>,
        deterministic: bool,
        rng:           &mut R,
    ) -> Tensor<B, 3> {
        let h    = self.norm1.forward(x.clone());
        let attn = self.self_attn.forward(MhaInput::self_attn(h)).context;
        let x    = x + dropout(attn, self.dropout_rate, deterministic, rng);

        let h = self.norm2.forward(x.clone());
        x + self.mlp.forward(h, deterministic, rng)
    }
}

#[derive(Module, Debug)]
pub struct VitRegressor<B: Backend> {
    pub patch_embedding:    Linear<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub head:               Linear<B>,
    pub nx:                 usize,
    pub ny:                 usize,
    pub patch_size:         usize,
    pub out_channels:       usize,
    pub dropout_rate:       f64,
}

impl<B: Backend> VitRegressor<B> {
    /// images: [batch, in_channels, nx, ny] → fields: [batch, out_channels, nx, ny]
    pub fn forward<R: Rng + ?Sized>(
        &self,
        images:        Tensor<B, 4>,
        deterministic: bool,
        rng:           &mut R,
    ) -> Tensor<B, 4> {
        let [batch_size, _, _, _] = images.dims();

        let tokens = patchify(images, self.patch_size);
        let [_, num_patches, _] = tokens.dims();
        let x = self.patch_embedding.forward(tokens);

        // Attention is permutation-invariant, so patch position must be injected.
        let positions = Tensor::<B, 1, Int>::arange(0..num_patches as i64, &x.device())
            .unsqueeze::<2>()
            .expand([batch_size, num_patches]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = dropout(x + pos_emb, self.dropout_rate, deterministic, rng);
        for layer in &self.layers {
            x = layer.forward(x, deterministic, rng);
        }
        let x = self.final_norm.forward(x); // [batch, patches, dim_model]

        let patches = self.head.forward(x); // [batch, patches, p*p*out]
        unpatchify(patches, self.patch_size, self.nx, self.ny, self.out_channels)
    }

    /// Mean squared error over every pixel of every field.
    pub fn forward_loss<R: Rng + ?Sized>(
        &self,
        batch:         FlowBatch<B>,
        deterministic: bool,
        rng:           &mut R,
    ) -> (Tensor<B, 1>, Tensor<B, 4>) {
        let predictions = self.forward(batch.inputs, deterministic, rng);
        let loss = MseLoss::new().forward(predictions.clone(), batch.targets, Reduction::Mean);
        (loss, predictions)
    }
}

// ─── Patch helpers ────────────────────────────────────────────────────────────
/// [b, c, nx, ny] → [b, (nx/p)·(ny/p), p·p·c], patches in row-major order.
pub fn patchify<B: Backend>(images: Tensor<B, 4>, p: usize) -> Tensor<B, 3> {
    let [b, c, nx, ny] = images.dims();
    let (hp, wp) = (nx / p, ny / p);
    images
        .reshape([b, c, hp, p, wp, p])
        .permute([0, 2, 4, 3, 5, 1])
        .reshape([b, hp * wp, p * p * c])
}

/// Inverse of `patchify` for `channels` output channels.
pub fn unpatchify<B: Backend>(
    tokens:   Tensor<B, 3>,
    p:        usize,
    nx:       usize,
    ny:       usize,
    channels: usize,
) -> Tensor<B, 4> {
    let [b, _, _] = tokens.dims();
    let (hp, wp) = (nx / p, ny / p);
    tokens
        .reshape([b, hp, wp, p, p, channels])
        .permute([0, 5, 1, 3, 2, 4])
        .reshape([b, channels, nx, ny])
}

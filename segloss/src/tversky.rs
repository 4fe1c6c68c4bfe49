//! Soft Tversky loss.
//!
//! Generalizes Dice with separate weights on false positives (`alpha`) and
//! false negatives (`beta`). Per class, over the batch and spatial axes:
//!
//! ```text
//! TP_c = Σ P_c * T_c
//! FP_c = Σ (1 - T_c) * P_c
//! FN_c = Σ T_c * (1 - P_c)
//! tversky_c = (TP_c + smooth) / (TP_c + alpha * FP_c + beta * FN_c + smooth)
//! Loss = 1 - mean_c(tversky_c)
//! ```
//!
//! Unlike [`dice_loss`](crate::dice_loss) there is no sigmoid path for
//! single-channel logits. One channel is expanded over exactly one class and
//! softmaxed over one channel, so every prediction matches and the loss is
//! constantly zero. Callers with binary masks should emit two channels.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{Int, Tensor, backend::Backend},
};

use crate::{
    error::LossResult,
    labels::{check_class_count, one_hot, prepare_labels},
    probability::{class_probabilities, sum_per_class},
};

/// Default false-positive weight of [`tversky_loss`].
pub const DEFAULT_TVERSKY_ALPHA: f64 = 0.5;
/// Default false-negative weight of [`tversky_loss`].
pub const DEFAULT_TVERSKY_BETA: f64 = 0.5;
/// Default smoothing term of [`tversky_loss`].
pub const DEFAULT_TVERSKY_SMOOTH: f64 = 1.0;

/// Soft Tversky loss of `logits` against an integer label map.
///
/// With `alpha = beta = 0.5` this is the Dice formula with `smooth` added to
/// both numerator and denominator.
///
/// # Shapes
///
/// - logits: `[batch_size, classes, H, W]`
/// - ground_truth: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
/// - output: `[1]`
///
/// # Errors
///
/// Fails on label maps that cannot be normalized, labels outside
/// `[0, classes)`, or logits whose batch/spatial dimensions differ from the
/// labels.
pub fn tversky_loss<B: Backend, const D: usize>(
    logits: Tensor<B, 4>,
    ground_truth: Tensor<B, D, Int>,
    alpha: f64,
    beta: f64,
    smooth: f64,
) -> LossResult<Tensor<B, 1>> {
    let tversky = tversky_indices(logits, ground_truth, alpha, beta, smooth)?.mean();
    Ok(Tensor::ones_like(&tversky) - tversky)
}

/// Per-class Tversky indices, shape `[classes]`.
pub fn tversky_indices<B: Backend, const D: usize>(
    logits: Tensor<B, 4>,
    ground_truth: Tensor<B, D, Int>,
    alpha: f64,
    beta: f64,
    smooth: f64,
) -> LossResult<Tensor<B, 1>> {
    let labels = prepare_labels(&logits, ground_truth)?;
    let [_, channels, _, _] = logits.dims();
    tracing::debug!(dims = ?logits.dims(), classes = channels, alpha, beta, smooth, "tversky loss");

    if channels == 1 {
        tracing::warn!("tversky loss on single-channel logits has no binary path; loss is always zero");
    }

    let targets = one_hot(labels, channels)?;
    let probabilities = class_probabilities(logits);

    let true_positives = sum_per_class(probabilities.clone() * targets.clone());
    let false_positives =
        sum_per_class((Tensor::ones_like(&targets) - targets.clone()) * probabilities.clone());
    let false_negatives =
        sum_per_class(targets * (Tensor::ones_like(&probabilities) - probabilities));

    let numerator = true_positives.clone().add_scalar(smooth);
    let denominator = true_positives
        + false_positives.mul_scalar(alpha)
        + false_negatives.mul_scalar(beta);

    Ok(numerator / denominator.add_scalar(smooth))
}

/// Configuration for creating a [Tversky loss](TverskyLoss).
#[derive(Config, Debug)]
pub struct TverskyLossConfig {
    /// Weight on false positives. Default: 0.5
    #[config(default = 0.5)]
    pub alpha: f64,

    /// Weight on false negatives. Default: 0.5
    #[config(default = 0.5)]
    pub beta: f64,

    /// Added to numerator and denominator. Default: 1.0
    #[config(default = 1.0)]
    pub smooth: f64,

    /// Expected number of logits channels. Unchecked when `None`.
    pub num_classes: Option<usize>,
}

impl TverskyLossConfig {
    /// Initialize [Tversky loss](TverskyLoss).
    pub fn init(&self) -> TverskyLoss {
        self.assertions();
        TverskyLoss {
            alpha: self.alpha,
            beta: self.beta,
            smooth: self.smooth,
            num_classes: self.num_classes,
        }
    }

    fn assertions(&self) {
        assert!(
            self.alpha >= 0.0 && self.beta >= 0.0,
            "Alpha and beta for TverskyLoss must be non-negative, got alpha={} beta={}",
            self.alpha,
            self.beta
        );
        assert!(
            self.smooth > 0.0,
            "Smooth for TverskyLoss must be positive, got {}",
            self.smooth
        );
        if let Some(num_classes) = self.num_classes {
            assert!(
                num_classes > 0,
                "Number of classes for TverskyLoss must be positive"
            );
        }
    }
}

/// Soft Tversky loss over integer label maps.
///
/// Always uses the softmax path, see the [module docs](self).
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct TverskyLoss {
    /// Weight on false positives.
    pub alpha: f64,
    /// Weight on false negatives.
    pub beta: f64,
    /// Added to numerator and denominator.
    pub smooth: f64,
    /// Expected number of logits channels.
    pub num_classes: Option<usize>,
}

impl Default for TverskyLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for TverskyLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("alpha", &self.alpha)
            .add("beta", &self.beta)
            .add("smooth", &self.smooth)
            .add("num_classes", &self.num_classes)
            .optional()
    }
}

impl TverskyLoss {
    /// Create a new Tversky loss with default configuration.
    pub fn new() -> Self {
        TverskyLossConfig::new().init()
    }

    /// Compute the criterion with reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, H, W]`
    /// - targets: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[1]`
    pub fn forward<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, D, Int>,
        reduction: Reduction,
    ) -> LossResult<Tensor<B, 1>> {
        let loss = self.forward_no_reduction(logits, targets)?;
        Ok(match reduction {
            Reduction::Mean | Reduction::Auto => loss.mean(),
            Reduction::Sum => loss.sum(),
        })
    }

    /// Compute the per-class loss `1 - tversky_c` without reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, H, W]`
    /// - targets: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[classes]`
    pub fn forward_no_reduction<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, D, Int>,
    ) -> LossResult<Tensor<B, 1>> {
        check_class_count(&logits, self.num_classes)?;
        let tversky = tversky_indices(logits, targets, self.alpha, self.beta, self.smooth)?;
        Ok(Tensor::ones_like(&tversky) - tversky)
    }
}

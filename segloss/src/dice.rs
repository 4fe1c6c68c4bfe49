//! Soft Dice loss.
//!
//! For every class `c`, with `P` the predicted probabilities and `T` the
//! one-hot ground truth, sums run over the batch and both spatial axes:
//!
//! ```text
//! dice_c = 2 * Σ(P_c * T_c) / (Σ P_c + Σ T_c + eps)
//! Loss   = 1 - mean_c(dice_c)
//! ```
//!
//! Single-channel logits take the binary path: `sigmoid` gives the positive
//! mass, its complement the negative mass, and the labels are expanded over
//! two synthetic classes to match.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::Reduction,
    tensor::{Int, Tensor, backend::Backend},
};

use crate::{
    error::LossResult,
    labels::{binary_one_hot, check_class_count, one_hot, prepare_labels},
    probability::{binary_probabilities, class_probabilities, sum_per_class},
};

/// Default denominator epsilon of [`dice_loss`].
pub const DEFAULT_DICE_EPS: f64 = 1e-7;

/// Soft Dice loss of `logits` against an integer label map.
///
/// Returns `1 - mean_c(dice_c)`: 0 for perfect overlap, 1 for none.
///
/// # Shapes
///
/// - ground_truth: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
/// - logits: `[batch_size, classes, H, W]`
/// - output: `[1]`
///
/// # Errors
///
/// Fails on label maps that cannot be normalized, labels outside the class
/// range, or logits whose batch/spatial dimensions differ from the labels.
pub fn dice_loss<B: Backend, const D: usize>(
    ground_truth: Tensor<B, D, Int>,
    logits: Tensor<B, 4>,
    eps: f64,
) -> LossResult<Tensor<B, 1>> {
    let dice = dice_coefficients(ground_truth, logits, eps)?.mean();
    Ok(Tensor::ones_like(&dice) - dice)
}

/// Per-class Dice coefficients, shape `[classes]`.
///
/// Binary (single-channel) logits yield two coefficients: foreground first,
/// then background.
pub fn dice_coefficients<B: Backend, const D: usize>(
    ground_truth: Tensor<B, D, Int>,
    logits: Tensor<B, 4>,
    eps: f64,
) -> LossResult<Tensor<B, 1>> {
    let labels = prepare_labels(&logits, ground_truth)?;
    let [_, channels, _, _] = logits.dims();
    tracing::debug!(dims = ?logits.dims(), classes = channels, eps, "dice loss");

    let (probabilities, targets) = if channels == 1 {
        (binary_probabilities(logits), binary_one_hot(labels)?)
    } else {
        (class_probabilities(logits), one_hot(labels, channels)?)
    };

    let intersection = sum_per_class(probabilities.clone() * targets.clone());
    let cardinality = sum_per_class(probabilities + targets);

    Ok(intersection.mul_scalar(2.0) / cardinality.add_scalar(eps))
}

/// Configuration for creating a [Dice loss](DiceLoss).
#[derive(Config, Debug)]
pub struct DiceLossConfig {
    /// Epsilon added to the denominator. Default: 1e-7
    #[config(default = 1e-7)]
    pub eps: f64,

    /// Expected number of logits channels. Unchecked when `None`.
    pub num_classes: Option<usize>,
}

impl DiceLossConfig {
    /// Initialize [Dice loss](DiceLoss).
    pub fn init(&self) -> DiceLoss {
        self.assertions();
        DiceLoss {
            eps: self.eps,
            num_classes: self.num_classes,
        }
    }

    fn assertions(&self) {
        assert!(
            self.eps > 0.0,
            "Epsilon for DiceLoss must be positive, got {}",
            self.eps
        );
        if let Some(num_classes) = self.num_classes {
            assert!(
                num_classes > 0,
                "Number of classes for DiceLoss must be positive"
            );
        }
    }
}

/// Soft Dice loss over integer label maps.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct DiceLoss {
    /// Epsilon added to the denominator.
    pub eps: f64,
    /// Expected number of logits channels.
    pub num_classes: Option<usize>,
}

impl Default for DiceLoss {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleDisplay for DiceLoss {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("eps", &self.eps)
            .add("num_classes", &self.num_classes)
            .optional()
    }
}

impl DiceLoss {
    /// Create a new Dice loss with default configuration.
    pub fn new() -> Self {
        DiceLossConfig::new().init()
    }

    /// Compute the criterion with reduction.
    ///
    /// `Mean` and `Auto` give `1 - mean_c(dice_c)`; `Sum` adds up the
    /// per-class losses.
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

    /// Compute the per-class loss `1 - dice_c` without reduction.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, H, W]`
    /// - targets: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[classes]`, or `[2]` for single-channel logits
    pub fn forward_no_reduction<B: Backend, const D: usize>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, D, Int>,
    ) -> LossResult<Tensor<B, 1>> {
        check_class_count(&logits, self.num_classes)?;
        let dice = dice_coefficients(targets, logits, self.eps)?;
        Ok(Tensor::ones_like(&dice) - dice)
    }
}

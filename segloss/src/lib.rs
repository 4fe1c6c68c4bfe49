//! Segmentation losses for training with the Burn deep learning framework.
//!
//! All losses take raw `[batch_size, classes, H, W]` logits and an integer
//! label map, and return a scalar loss tensor. They are backend-agnostic.
//!
//! ## Losses
//!
//! - **[`dice_loss`] / [`DiceLoss`]**: soft Dice, `1 - mean_c(dice_c)`. Single
//!   channel logits are treated as binary with a sigmoid.
//! - **[`tversky_loss`] / [`TverskyLoss`]**: soft Tversky with separate false
//!   positive and false negative weights. Always softmax-based.
//! - **[`CEDiceLoss`]**: softmax cross-entropy plus soft Dice.
//!
//! Each loss implements [`SegmentationLoss`], the
//! `evaluate(prediction, target, epoch)` call a training loop expects, and
//! [`LossKind`] picks one from configuration.
//!
//! ## Label maps
//!
//! Targets may be `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`.
//! Labels must lie in `[0, classes)`; out-of-range labels, shape mismatches
//! and unsupported ranks are reported as [`LossError`] instead of being
//! clipped or broadcast. Float-stored label maps go through
//! [`labels_from_float`] first.
//!
//! ## Usage Example
//!
//! ```rust
//! use burn::prelude::*;
//! use segloss::{LossResult, SegmentationLoss, TverskyLossConfig};
//!
//! fn step<B: Backend>(logits: Tensor<B, 4>, labels: Tensor<B, 3, Int>) -> LossResult<Tensor<B, 1>> {
//!     let loss = TverskyLossConfig::new().with_alpha(0.7).with_beta(0.3).init();
//!     loss.evaluate(logits, labels, 0)
//! }
//! ```

mod ce_dice;
mod dice;
mod error;
pub mod labels;
pub mod probability;
mod segmentation_loss;
mod tversky;

pub use ce_dice::{CEDiceLoss, CEDiceLossConfig};
pub use dice::{DEFAULT_DICE_EPS, DiceLoss, DiceLossConfig, dice_coefficients, dice_loss};
pub use error::{LossError, LossResult};
pub use labels::labels_from_float;
pub use segmentation_loss::{AnyLoss, LossKind, SegmentationLoss};
pub use tversky::{
    DEFAULT_TVERSKY_ALPHA, DEFAULT_TVERSKY_BETA, DEFAULT_TVERSKY_SMOOTH, TverskyLoss,
    TverskyLossConfig, tversky_indices, tversky_loss,
};

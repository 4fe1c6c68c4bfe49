//! Uniform entry point for training loops.
//!
//! Every loss here is called as `evaluate(prediction, target, epoch)`. The
//! epoch counter exists for loops that schedule loss weights; none of these
//! losses use it. [`LossKind`] selects a loss from configuration and
//! [`AnyLoss`] dispatches to it.

use burn::{
    config::Config,
    nn::loss::Reduction,
    tensor::{Int, Tensor, backend::Backend},
};

use crate::{
    ce_dice::{CEDiceLoss, CEDiceLossConfig},
    dice::{DiceLoss, DiceLossConfig},
    error::LossResult,
    tversky::{TverskyLoss, TverskyLossConfig},
};

/// A segmentation criterion with a `(prediction, target, epoch) -> scalar` contract.
pub trait SegmentationLoss<B: Backend> {
    /// Evaluate the loss for one batch.
    ///
    /// # Shapes
    ///
    /// - prediction: `[batch_size, classes, H, W]` raw logits
    /// - target: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[1]`
    fn evaluate<const D: usize>(
        &self,
        prediction: Tensor<B, 4>,
        target: Tensor<B, D, Int>,
        epoch: usize,
    ) -> LossResult<Tensor<B, 1>>;
}

impl<B: Backend> SegmentationLoss<B> for DiceLoss {
    fn evaluate<const D: usize>(
        &self,
        prediction: Tensor<B, 4>,
        target: Tensor<B, D, Int>,
        _epoch: usize,
    ) -> LossResult<Tensor<B, 1>> {
        self.forward(prediction, target, Reduction::Mean)
    }
}

impl<B: Backend> SegmentationLoss<B> for TverskyLoss {
    fn evaluate<const D: usize>(
        &self,
        prediction: Tensor<B, 4>,
        target: Tensor<B, D, Int>,
        _epoch: usize,
    ) -> LossResult<Tensor<B, 1>> {
        self.forward(prediction, target, Reduction::Mean)
    }
}

impl<B: Backend> SegmentationLoss<B> for CEDiceLoss<B> {
    fn evaluate<const D: usize>(
        &self,
        prediction: Tensor<B, 4>,
        target: Tensor<B, D, Int>,
        _epoch: usize,
    ) -> LossResult<Tensor<B, 1>> {
        self.forward(prediction, target)
    }
}

/// Selects which segmentation loss a training run uses.
#[derive(Config, Debug)]
pub enum LossKind {
    /// Soft Dice loss.
    Dice(DiceLossConfig),
    /// Soft Tversky loss.
    Tversky(TverskyLossConfig),
    /// Cross-entropy plus soft Dice loss.
    CeDice(CEDiceLossConfig),
}

impl LossKind {
    /// Build the selected loss.
    pub fn init<B: Backend>(&self, device: &B::Device) -> AnyLoss<B> {
        match self {
            Self::Dice(config) => AnyLoss::Dice(config.init()),
            Self::Tversky(config) => AnyLoss::Tversky(config.init()),
            Self::CeDice(config) => AnyLoss::CeDice(config.init(device)),
        }
    }
}

/// One of the segmentation losses, chosen at runtime.
#[derive(Debug)]
pub enum AnyLoss<B: Backend> {
    /// Soft Dice loss.
    Dice(DiceLoss),
    /// Soft Tversky loss.
    Tversky(TverskyLoss),
    /// Cross-entropy plus soft Dice loss.
    CeDice(CEDiceLoss<B>),
}

impl<B: Backend> AnyLoss<B> {
    /// Short name of the wrapped loss.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dice(_) => "dice",
            Self::Tversky(_) => "tversky",
            Self::CeDice(_) => "ce_dice",
        }
    }
}

impl<B: Backend> SegmentationLoss<B> for AnyLoss<B> {
    fn evaluate<const D: usize>(
        &self,
        prediction: Tensor<B, 4>,
        target: Tensor<B, D, Int>,
        epoch: usize,
    ) -> LossResult<Tensor<B, 1>> {
        tracing::trace!(loss = self.name(), epoch, "evaluating segmentation loss");
        match self {
            Self::Dice(loss) => loss.evaluate(prediction, target, epoch),
            Self::Tversky(loss) => loss.evaluate(prediction, target, epoch),
            Self::CeDice(loss) => loss.evaluate(prediction, target, epoch),
        }
    }
}

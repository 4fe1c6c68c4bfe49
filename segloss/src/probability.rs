//! Conversion of raw logits into per-class probability maps.

use burn::tensor::{
    Tensor,
    activation::{sigmoid, softmax},
    backend::Backend,
};

/// Softmax over the class axis of `[B, C, H, W]` logits.
pub fn class_probabilities<B: Backend>(logits: Tensor<B, 4>) -> Tensor<B, 4> {
    softmax(logits, 1)
}

/// Positive and negative mass for single-channel `[B, 1, H, W]` logits.
///
/// Returns `[B, 2, H, W]` with `sigmoid(logits)` in channel 0 and its
/// complement in channel 1, the order produced by
/// [`binary_one_hot`](crate::labels::binary_one_hot).
pub fn binary_probabilities<B: Backend>(logits: Tensor<B, 4>) -> Tensor<B, 4> {
    let positive = sigmoid(logits);
    let negative = Tensor::ones_like(&positive) - positive.clone();

    Tensor::cat(vec![positive, negative], 1)
}

/// Sum every axis except the class axis, giving one value per class.
///
/// # Shapes
///
/// - input: `[batch_size, classes, height, width]`
/// - output: `[classes]`
pub(crate) fn sum_per_class<B: Backend>(tensor: Tensor<B, 4>) -> Tensor<B, 1> {
    let [_, classes, _, _] = tensor.dims();
    tensor.sum_dim(0).sum_dim(2).sum_dim(3).reshape([classes])
}

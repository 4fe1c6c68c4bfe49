use thiserror::Error;

/// The error type for segmentation loss evaluation.
///
/// Every variant describes a caller mistake in the tensors handed to a loss.
/// Nothing here is transient, so nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LossError {
    /// The label map rank or channel axis cannot be normalized to `[B, 1, H, W]`.
    #[error("Invalid label map shape: expected {expected}, got {actual:?}")]
    InvalidShape {
        /// The accepted shapes.
        expected: String,
        /// The dimensions that were received.
        actual: Vec<usize>,
    },

    /// A label lies outside the class range implied by the logits.
    #[error("Invalid label {value} for {num_classes} classes")]
    InvalidLabel {
        /// The offending label value.
        value: i64,
        /// The number of classes the labels were expanded over.
        num_classes: usize,
    },

    /// A float-stored label is not exactly integer-valued.
    #[error("Label {value} is not integer-valued")]
    NonIntegerLabel {
        /// The offending label value.
        value: f64,
    },

    /// Logits and labels disagree on batch or spatial dimensions.
    #[error("Shape mismatch: logits {logits:?} vs labels {labels:?}")]
    ShapeMismatch {
        /// Logits dimensions `[B, C, H, W]`.
        logits: Vec<usize>,
        /// Normalized label dimensions `[B, 1, H, W]`.
        labels: Vec<usize>,
    },

    /// The logits channel count does not fit the requested loss.
    #[error("Class count mismatch: expected {expected}, got {actual}")]
    ClassCountMismatch {
        /// The class count required.
        expected: String,
        /// The number of logits channels received.
        actual: usize,
    },
}

/// A specialized `Result` type for loss evaluation.
pub type LossResult<T> = Result<T, LossError>;

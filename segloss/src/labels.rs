//! Label map handling for segmentation losses.
//!
//! Ground truth arrives as an integer class map shaped `[H, W]`, `[B, H, W]`
//! or `[B, 1, H, W]`. Every loss brings it to the canonical `[B, 1, H, W]`
//! layout, checks it against the logits, and expands it into one channel per
//! class:
//!
//! ```text
//! [H, W]        -> [1, 1, H, W]
//! [B, H, W]     -> [B, 1, H, W]
//! [B, 1, H, W]  -> [B, 1, H, W]
//! one_hot:         [B, 1, H, W] -> [B, K, H, W]
//! ```

use burn::tensor::{ElementConversion, Int, Tensor, backend::Backend};

use crate::error::{LossError, LossResult};

const ACCEPTED_LABEL_SHAPES: &str = "[H, W], [B, H, W] or [B, 1, H, W]";

/// Normalize a label map to `[B, 1, H, W]`.
///
/// The input tensor is consumed; the returned tensor is a reshaped view of
/// the same labels.
///
/// # Errors
///
/// [`LossError::InvalidShape`] for ranks other than 2, 3 and 4, or for a
/// rank-4 map whose channel axis is not 1.
pub fn normalize_labels<B: Backend, const D: usize>(
    labels: Tensor<B, D, Int>,
) -> LossResult<Tensor<B, 4, Int>> {
    let dims = labels.dims();
    let shape = match *dims.as_slice() {
        [height, width] => [1, 1, height, width],
        [batch, height, width] | [batch, 1, height, width] => [batch, 1, height, width],
        _ => {
            return Err(LossError::InvalidShape {
                expected: ACCEPTED_LABEL_SHAPES.to_string(),
                actual: dims.to_vec(),
            })
        }
    };

    Ok(labels.reshape(shape))
}

/// Normalize `labels` and check them against `logits`.
///
/// Logits must carry at least one channel, and the normalized labels must
/// share the logits batch and spatial dimensions. Nothing is broadcast.
pub fn prepare_labels<B: Backend, const D: usize>(
    logits: &Tensor<B, 4>,
    labels: Tensor<B, D, Int>,
) -> LossResult<Tensor<B, 4, Int>> {
    let labels = normalize_labels(labels)?;
    let [batch, channels, height, width] = logits.dims();
    let [label_batch, _, label_height, label_width] = labels.dims();

    if channels == 0 {
        return Err(LossError::ClassCountMismatch {
            expected: "at least 1".to_string(),
            actual: channels,
        });
    }

    if (batch, height, width) != (label_batch, label_height, label_width) {
        return Err(LossError::ShapeMismatch {
            logits: logits.dims().to_vec(),
            labels: labels.dims().to_vec(),
        });
    }

    Ok(labels)
}

/// Fail if a configured class count disagrees with the logits channel axis.
pub fn check_class_count<B: Backend>(
    logits: &Tensor<B, 4>,
    num_classes: Option<usize>,
) -> LossResult<()> {
    let [_, channels, _, _] = logits.dims();
    match num_classes {
        Some(expected) if expected != channels => Err(LossError::ClassCountMismatch {
            expected: expected.to_string(),
            actual: channels,
        }),
        _ => Ok(()),
    }
}

/// Fail unless every label lies in `[0, num_classes)`.
pub fn validate_label_range<B: Backend>(
    labels: &Tensor<B, 4, Int>,
    num_classes: usize,
) -> LossResult<()> {
    if labels.shape().num_elements() == 0 {
        return Ok(());
    }

    let min = labels.clone().min().into_scalar().elem::<i64>();
    let max = labels.clone().max().into_scalar().elem::<i64>();

    let offending = if min < 0 {
        Some(min)
    } else if max >= num_classes as i64 {
        Some(max)
    } else {
        None
    };

    match offending {
        Some(value) => Err(LossError::InvalidLabel { value, num_classes }),
        None => Ok(()),
    }
}

/// Expand `[B, 1, H, W]` labels into a `[B, K, H, W]` float one-hot map.
///
/// Channel `k` holds 1 where the label equals `k`.
///
/// # Errors
///
/// [`LossError::InvalidLabel`] if any label is outside `[0, num_classes)`.
pub fn one_hot<B: Backend>(labels: Tensor<B, 4, Int>, num_classes: usize) -> LossResult<Tensor<B, 4>> {
    validate_label_range(&labels, num_classes)?;

    let channels = (0..num_classes)
        .map(|class| labels.clone().equal_elem(class as i64).float())
        .collect();

    Ok(Tensor::cat(channels, 1))
}

/// Expand binary `[B, 1, H, W]` labels into a two-channel float map.
///
/// Channel 0 marks class 1 and channel 1 marks class 0, lining up with
/// [`binary_probabilities`](crate::probability::binary_probabilities), which
/// puts the positive sigmoid mass first.
///
/// # Errors
///
/// [`LossError::InvalidLabel`] if any label is outside `[0, 1]`.
pub fn binary_one_hot<B: Backend>(labels: Tensor<B, 4, Int>) -> LossResult<Tensor<B, 4>> {
    validate_label_range(&labels, 2)?;

    let positive = labels.clone().equal_elem(1).float();
    let negative = labels.equal_elem(0).float();

    Ok(Tensor::cat(vec![positive, negative], 1))
}

/// Convert a float-stored label map into integer labels.
///
/// Values are checked on the float side first, so NaN and infinite labels
/// are reported instead of reaching the integer cast.
///
/// # Errors
///
/// [`LossError::NonIntegerLabel`] with the offending value if any element is
/// not finite, or with the worst offending value if any element has a
/// fractional part.
pub fn labels_from_float<B: Backend, const D: usize>(
    labels: Tensor<B, D>,
) -> LossResult<Tensor<B, D, Int>> {
    if labels.shape().num_elements() == 0 {
        return Ok(labels.int());
    }

    let flat_labels: Tensor<B, 1> = labels.clone().reshape([-1]);
    let non_finite = flat_labels.clone().is_nan().int() + flat_labels.clone().is_inf().int();
    if non_finite.clone().max().into_scalar().elem::<i64>() > 0 {
        let value = flat_labels
            .select(0, non_finite.argmax(0))
            .into_scalar()
            .elem::<f64>();
        return Err(LossError::NonIntegerLabel { value });
    }

    let truncated = labels.int();
    let residual = (flat_labels.clone() - truncated.clone().float().reshape([-1])).abs();
    let worst = residual.clone().max().into_scalar().elem::<f64>();

    if worst > 0.0 {
        let value = flat_labels
            .select(0, residual.argmax(0))
            .into_scalar()
            .elem::<f64>();
        return Err(LossError::NonIntegerLabel { value });
    }

    Ok(truncated)
}

#[cfg(test)]
mod tests {
    use burn::tensor::{TensorData, Tolerance};

    use super::*;
    use crate::tests::TestBackend;

    #[test]
    fn normalize_labels_rank_two_adds_batch_and_channel_axes() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 2, Int>::zeros([4, 4], &device);

        let normalized = normalize_labels(labels).expect("rank 2 labels normalize");

        assert_eq!(normalized.dims(), [1, 1, 4, 4]);
    }

    #[test]
    fn normalize_labels_rank_three_inserts_channel_axis() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 3, Int>::zeros([2, 4, 5], &device);

        let normalized = normalize_labels(labels).expect("rank 3 labels normalize");

        assert_eq!(normalized.dims(), [2, 1, 4, 5]);
    }

    #[test]
    fn normalize_labels_rank_four_passes_through() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::zeros([3, 1, 2, 2], &device);

        let normalized = normalize_labels(labels).expect("rank 4 labels normalize");

        assert_eq!(normalized.dims(), [3, 1, 2, 2]);
    }

    #[test]
    fn normalize_labels_rejects_multi_channel_rank_four() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::zeros([2, 3, 4, 4], &device);

        let err = normalize_labels(labels).unwrap_err();

        assert!(matches!(
            err,
            LossError::InvalidShape { ref actual, .. } if actual == &vec![2, 3, 4, 4]
        ));
    }

    #[test]
    fn normalize_labels_rejects_unsupported_ranks() {
        let device = Default::default();
        let rank_one = Tensor::<TestBackend, 1, Int>::zeros([4], &device);
        let rank_five = Tensor::<TestBackend, 5, Int>::zeros([1, 1, 1, 2, 2], &device);

        assert!(matches!(
            normalize_labels(rank_one),
            Err(LossError::InvalidShape { .. })
        ));
        assert!(matches!(
            normalize_labels(rank_five),
            Err(LossError::InvalidShape { .. })
        ));
    }

    #[test]
    fn prepare_labels_rejects_spatial_mismatch() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        let labels = Tensor::<TestBackend, 3, Int>::zeros([2, 4, 5], &device);

        let err = prepare_labels(&logits, labels).unwrap_err();

        assert_eq!(
            err,
            LossError::ShapeMismatch {
                logits: vec![2, 3, 4, 4],
                labels: vec![2, 1, 4, 5],
            }
        );
    }

    #[test]
    fn prepare_labels_rejects_batch_mismatch_for_single_map() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::zeros([2, 3, 4, 4], &device);
        let labels = Tensor::<TestBackend, 2, Int>::zeros([4, 4], &device);

        assert!(matches!(
            prepare_labels(&logits, labels),
            Err(LossError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn prepare_labels_rejects_channelless_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::zeros([1, 0, 2, 2], &device);
        let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 2], &device);

        assert!(matches!(
            prepare_labels(&logits, labels),
            Err(LossError::ClassCountMismatch { actual: 0, .. })
        ));
    }

    #[test]
    fn one_hot_places_class_axis_at_position_one() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::from_data(
            TensorData::from([[[[0, 1], [2, 1]]]]),
            &device,
        );

        let encoded = one_hot(labels, 3).expect("labels in range");

        let expected = TensorData::from([[
            [[1.0, 0.0], [0.0, 0.0]],
            [[0.0, 1.0], [0.0, 1.0]],
            [[0.0, 0.0], [1.0, 0.0]],
        ]]);
        encoded
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::default());
    }

    #[test]
    fn one_hot_rejects_labels_beyond_class_count() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::from_data(
            TensorData::from([[[[0, 5], [2, 1]]]]),
            &device,
        );

        let err = one_hot(labels, 3).unwrap_err();

        assert_eq!(
            err,
            LossError::InvalidLabel {
                value: 5,
                num_classes: 3
            }
        );
    }

    #[test]
    fn one_hot_rejects_negative_labels() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::from_data(
            TensorData::from([[[[0, -1], [1, 1]]]]),
            &device,
        );

        assert!(matches!(
            one_hot(labels, 2),
            Err(LossError::InvalidLabel { value: -1, .. })
        ));
    }

    #[test]
    fn binary_one_hot_puts_foreground_first() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::from_data(
            TensorData::from([[[[1, 0], [0, 1]]]]),
            &device,
        );

        let encoded = binary_one_hot(labels).expect("binary labels");

        let expected = TensorData::from([[
            [[1.0, 0.0], [0.0, 1.0]],
            [[0.0, 1.0], [1.0, 0.0]],
        ]]);
        encoded
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::default());
    }

    #[test]
    fn binary_one_hot_rejects_label_two() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 4, Int>::from_data(
            TensorData::from([[[[1, 2]]]]),
            &device,
        );

        assert!(matches!(
            binary_one_hot(labels),
            Err(LossError::InvalidLabel {
                value: 2,
                num_classes: 2
            })
        ));
    }

    #[test]
    fn labels_from_float_accepts_integer_values() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 2>::from_data(TensorData::from([[0.0, 1.0], [2.0, 1.0]]), &device);

        let converted = labels_from_float(labels).expect("integer-valued labels");
        let encoded = one_hot(normalize_labels(converted).expect("rank 2"), 3).expect("in range");

        assert_eq!(encoded.dims(), [1, 3, 2, 2]);
    }

    #[test]
    fn labels_from_float_rejects_fractional_values() {
        let device = Default::default();
        let labels =
            Tensor::<TestBackend, 2>::from_data(TensorData::from([[0.0, 1.5], [2.0, 1.0]]), &device);

        let err = labels_from_float(labels).unwrap_err();

        assert_eq!(err, LossError::NonIntegerLabel { value: 1.5 });
    }

    #[test]
    fn labels_from_float_rejects_nan() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.0, f32::NAN], [1.0, 1.0]]),
            &device,
        );

        let err = labels_from_float(labels).unwrap_err();

        assert!(matches!(err, LossError::NonIntegerLabel { value } if value.is_nan()));
    }

    #[test]
    fn labels_from_float_rejects_infinite() {
        let device = Default::default();
        let labels = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[0.0, 1.0], [f32::NEG_INFINITY, 1.0]]),
            &device,
        );

        let err = labels_from_float(labels).unwrap_err();

        assert_eq!(
            err,
            LossError::NonIntegerLabel {
                value: f64::NEG_INFINITY
            }
        );
    }
}

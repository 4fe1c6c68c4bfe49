//! Cross-entropy plus Dice loss.
//!
//! ```text
//! Loss = dice_loss(labels, logits, eps) + CrossEntropy(logits, labels)
//! ```
//!
//! The two terms are added unweighted. Cross-entropy is taken per pixel over
//! the class axis and averaged over all `B * H * W` pixels.

use burn::{
    config::Config,
    module::{Content, DisplaySettings, Module, ModuleDisplay},
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    tensor::{Int, Tensor, backend::Backend},
};

use crate::{
    dice::dice_loss,
    error::{LossError, LossResult},
    labels::{check_class_count, prepare_labels, validate_label_range},
};

/// Configuration for creating a [cross-entropy + Dice loss](CEDiceLoss).
#[derive(Config, Debug)]
pub struct CEDiceLossConfig {
    /// Epsilon added to the Dice denominator. Default: 1e-7
    #[config(default = 1e-7)]
    pub eps: f64,

    /// Expected number of logits channels. Unchecked when `None`.
    pub num_classes: Option<usize>,
}

impl CEDiceLossConfig {
    /// Initialize [cross-entropy + Dice loss](CEDiceLoss).
    pub fn init<B: Backend>(&self, device: &B::Device) -> CEDiceLoss<B> {
        self.assertions();
        CEDiceLoss {
            eps: self.eps,
            num_classes: self.num_classes,
            ce_loss: CrossEntropyLossConfig::new().init(device),
        }
    }

    fn assertions(&self) {
        assert!(
            self.eps > 0.0,
            "Epsilon for CEDiceLoss must be positive, got {}",
            self.eps
        );
        if let Some(num_classes) = self.num_classes {
            assert!(
                num_classes > 1,
                "Number of classes for CEDiceLoss must be at least 2, got {num_classes}"
            );
        }
    }
}

/// Sum of softmax cross-entropy and soft Dice loss.
///
/// Needs at least two logits channels; cross-entropy has no single-logit form.
#[derive(Module, Debug)]
#[module(custom_display)]
pub struct CEDiceLoss<B: Backend> {
    /// Epsilon added to the Dice denominator.
    pub eps: f64,
    /// Expected number of logits channels.
    pub num_classes: Option<usize>,
    /// Cross-entropy criterion.
    pub ce_loss: CrossEntropyLoss<B>,
}

impl<B: Backend> ModuleDisplay for CEDiceLoss<B> {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content
            .add("eps", &self.eps)
            .add("num_classes", &self.num_classes)
            .add("ce_loss", &self.ce_loss)
            .optional()
    }
}

impl<B: Backend> CEDiceLoss<B> {
    /// Create a new cross-entropy + Dice loss with default configuration.
    pub fn new(device: &B::Device) -> Self {
        CEDiceLossConfig::new().init(device)
    }

    /// Compute `dice + cross_entropy`.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, H, W]`
    /// - targets: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[1]`
    pub fn forward<const D: usize>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, D, Int>,
    ) -> LossResult<Tensor<B, 1>> {
        let ce = self.cross_entropy(logits.clone(), targets.clone())?;
        let dice = dice_loss(targets, logits, self.eps)?;
        Ok(dice + ce)
    }

    /// Mean per-pixel cross-entropy of `logits` against the label map.
    ///
    /// # Shapes
    ///
    /// - logits: `[batch_size, classes, H, W]`
    /// - targets: `[H, W]`, `[batch_size, H, W]` or `[batch_size, 1, H, W]`
    /// - output: `[1]`
    pub fn cross_entropy<const D: usize>(
        &self,
        logits: Tensor<B, 4>,
        targets: Tensor<B, D, Int>,
    ) -> LossResult<Tensor<B, 1>> {
        check_class_count(&logits, self.num_classes)?;
        let labels = prepare_labels(&logits, targets)?;
        let [batch_size, channels, height, width] = logits.dims();

        if channels < 2 {
            return Err(LossError::ClassCountMismatch {
                expected: "at least 2".to_string(),
                actual: channels,
            });
        }
        validate_label_range(&labels, channels)?;

        let pixels = batch_size * height * width;
        tracing::debug!(pixels, classes = channels, "cross-entropy term");

        let logits = logits.permute([0, 2, 3, 1]).reshape([pixels, channels]);
        let labels = labels.reshape([pixels]);

        Ok(self.ce_loss.forward(logits, labels))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{Distribution, TensorData, Tolerance, Transaction};

    use super::*;
    use crate::{
        dice::DEFAULT_DICE_EPS,
        tests::{TestBackend, three_class_labels},
    };

    #[test]
    fn ce_dice_loss_uniform_logits_hand_computed() {
        let device = Default::default();
        let loss = CEDiceLoss::<TestBackend>::new(&device);
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_data(TensorData::from([[0, 1]]), &device);

        // Cross-entropy of a uniform two-way softmax is ln 2; each class
        // overlaps 0.5 against a cardinality of 2, so the Dice term is 0.5.
        let result = loss.forward(logits, labels).expect("valid inputs");

        let expected = TensorData::from([0.5 + std::f64::consts::LN_2]);
        result
            .into_data()
            .assert_approx_eq::<f32>(&expected, Tolerance::relative(1e-5));
    }

    #[test]
    fn ce_dice_loss_is_unweighted_sum_of_terms() {
        let device = Default::default();
        let loss = CEDiceLoss::<TestBackend>::new(&device);
        let logits =
            Tensor::<TestBackend, 4>::random([2, 3, 4, 4], Distribution::Normal(0.0, 1.0), &device);
        let labels = three_class_labels(&device);

        let combined = loss
            .forward(logits.clone(), labels.clone())
            .expect("valid inputs");
        let ce = loss
            .cross_entropy(logits.clone(), labels.clone())
            .expect("valid inputs");
        let dice = dice_loss(labels, logits, DEFAULT_DICE_EPS).expect("valid inputs");

        let [combined_data, expected_data] = Transaction::default()
            .register(combined)
            .register(ce + dice)
            .execute()
            .try_into()
            .expect("Correct amount of tensor data");

        combined_data.assert_approx_eq::<f32>(&expected_data, Tolerance::default());
    }

    #[test]
    fn ce_dice_loss_single_channel_logits_fail() {
        let device = Default::default();
        let loss = CEDiceLoss::<TestBackend>::new(&device);
        let logits = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);
        let labels = Tensor::<TestBackend, 2, Int>::zeros([2, 2], &device);

        assert!(matches!(
            loss.forward(logits, labels),
            Err(LossError::ClassCountMismatch { actual: 1, .. })
        ));
    }

    #[test]
    fn ce_dice_loss_label_outside_class_range_fails() {
        let device = Default::default();
        let loss = CEDiceLoss::<TestBackend>::new(&device);
        let logits = Tensor::<TestBackend, 4>::zeros([1, 3, 2, 2], &device);
        let labels =
            Tensor::<TestBackend, 2, Int>::from_data(TensorData::from([[0, 1], [5, 2]]), &device);

        assert_eq!(
            loss.forward(logits, labels).unwrap_err(),
            LossError::InvalidLabel {
                value: 5,
                num_classes: 3
            }
        );
    }

    #[test]
    #[should_panic = "Number of classes for CEDiceLoss must be at least 2"]
    fn ce_dice_loss_config_single_class_panics() {
        let device = Default::default();
        let _loss = CEDiceLossConfig::new()
            .with_num_classes(Some(1))
            .init::<TestBackend>(&device);
    }

    #[test]
    fn ce_dice_loss_display_shows_eps_and_criterion() {
        let device = Default::default();
        let loss = CEDiceLossConfig::new()
            .with_eps(1e-6)
            .init::<TestBackend>(&device);

        let display_str = format!("{loss}");
        assert!(display_str.contains("CEDiceLoss"));
        assert!(display_str.contains("eps: 0.000001"));
        assert!(display_str.contains("ce_loss"));
    }
}

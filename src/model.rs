use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

/// Height and width of the MNIST images.
pub const IMAGE_SIZE: usize = 28;
/// Number of channels produced by each convolution stage.
const CHANNELS: [usize; 2] = [6, 12];
const KERNEL_SIZE: usize = 3;
const POOL_SIZE: usize = 2;

/// Spatial output size of a convolution or pooling stage, applied to height
/// and width independently.
pub const fn conv_output_size(input: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (input + 2 * padding - kernel) / stride + 1
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 10)]
    pub num_classes: usize,
}

/// Two convolution stages followed by a linear classifier.
///
/// Each stage is convolution, ReLU, batch normalization and 2x2 max pooling;
/// the classifier maps the flattened feature maps to one score per class and
/// normalizes them into log-probabilities.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    conv1: Conv2d<B>,
    norm1: BatchNorm<B, 2>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    norm2: BatchNorm<B, 2>,
    pool2: MaxPool2d,
    linear: Linear<B>,
    activation: Relu,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        // 28 -> 26 -> 13 -> 6 -> 3 for the default input size.
        let size = conv_output_size(IMAGE_SIZE, KERNEL_SIZE, 1, 0);
        let size = conv_output_size(size, POOL_SIZE, POOL_SIZE, 0);
        let size = conv_output_size(size, KERNEL_SIZE, 2, 0);
        let size = conv_output_size(size, POOL_SIZE, POOL_SIZE, 0);

        Model {
            conv1: Conv2dConfig::new([1, CHANNELS[0]], [KERNEL_SIZE, KERNEL_SIZE]).init(device),
            norm1: BatchNormConfig::new(CHANNELS[0]).init(device),
            pool1: MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
                .with_strides([POOL_SIZE, POOL_SIZE])
                .init(),
            conv2: Conv2dConfig::new([CHANNELS[0], CHANNELS[1]], [KERNEL_SIZE, KERNEL_SIZE])
                .with_stride([2, 2])
                .init(device),
            norm2: BatchNormConfig::new(CHANNELS[1]).init(device),
            pool2: MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
                .with_strides([POOL_SIZE, POOL_SIZE])
                .init(),
            linear: LinearConfig::new(CHANNELS[1] * size * size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Model<B> {
    /// Computes per-class log-probabilities for a batch of images.
    ///
    /// # Shapes
    ///   - Images [batch_size, 1, 28, 28]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images); // [b, 6, 26, 26]
        let x = self.activation.forward(x);
        let x = self.norm1.forward(x);
        let x = self.pool1.forward(x); // [b, 6, 13, 13]

        let x = self.conv2.forward(x); // [b, 12, 6, 6]
        let x = self.activation.forward(x);
        let x = self.norm2.forward(x);
        let x = self.pool2.forward(x); // [b, 12, 3, 3]

        let x: Tensor<B, 2> = x.flatten(1, 3); // [b, 108]
        let x = self.linear.forward(x); // [b, num_classes]
        let x = self.activation.forward(x);

        log_softmax(x, 1)
    }
}

/// Negative log-likelihood of the targets under the model's log-probabilities.
pub fn nll_loss<B: Backend>(log_probs: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let indices = targets.unsqueeze_dim(1);

    log_probs.gather(1, indices).mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn forward_produces_one_score_per_class() {
        let device = NdArrayDevice::Cpu;
        let model: Model<TestBackend> = ModelConfig::new().init(&device);
        let images = Tensor::random([4, 1, 28, 28], Distribution::Default, &device);

        let output = model.forward(images);

        assert_eq!(output.dims(), [4, 10]);
    }

    #[test]
    fn output_rows_are_log_probabilities() {
        let device = NdArrayDevice::Cpu;
        let model: Model<TestBackend> = ModelConfig::new().init(&device);
        let images = Tensor::random([4, 1, 28, 28], Distribution::Default, &device);

        let sums = model.forward(images).exp().sum_dim(1);

        sums.into_data()
            .assert_approx_eq(&TensorData::from([[1.0f32], [1.0], [1.0], [1.0]]), 3);
    }

    #[test]
    fn forward_is_deterministic() {
        let device = NdArrayDevice::Cpu;
        let model: Model<TestBackend> = ModelConfig::new().init(&device);
        let images = Tensor::random([2, 1, 28, 28], Distribution::Default, &device);

        let first = model.forward(images.clone()).into_data();
        let second = model.forward(images).into_data();

        assert_eq!(first, second);
    }

    #[test]
    fn convolution_matches_size_formula() {
        let device = NdArrayDevice::Cpu;
        let conv: Conv2d<TestBackend> = Conv2dConfig::new([1, 1], [3, 3]).init(&device);
        let input = Tensor::random([1, 1, 5, 5], Distribution::Default, &device);

        let output = conv.forward(input);

        assert_eq!(conv_output_size(5, 3, 1, 0), 3);
        assert_eq!(output.dims(), [1, 1, 3, 3]);
    }

    #[test]
    fn nll_loss_is_exact_on_a_known_distribution() {
        let device = NdArrayDevice::Cpu;
        // Uniform log-probabilities over 4 classes: loss must be ln(4).
        let log_probs =
            Tensor::<TestBackend, 2>::from_data([[0.25f32.ln(); 4], [0.25f32.ln(); 4]], &device);
        let targets = Tensor::from_ints([1, 3], &device);

        let loss = nll_loss(log_probs, targets);

        loss.into_data()
            .assert_approx_eq(&TensorData::from([4.0f32.ln()]), 3);
    }
}

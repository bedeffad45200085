use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

/// Collates MNIST items into batched tensors on a given device.
#[derive(Clone)]
pub struct MnistBatcher<B: Backend> {
    device: B::Device,
}

/// One batch of images with their class labels, aligned by position.
#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> MnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<MnistItem, MnistBatch<B>> for MnistBatcher<B> {
    fn batch(&self, items: Vec<MnistItem>) -> MnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, &self.device))
            .map(|tensor| tensor.reshape([1, 1, 28, 28]))
            // Normalize: scale between [0,1] and make the mean=0 and std=1
            // values mean=0.1307,std=0.3081 are the standard MNIST statistics
            .map(|tensor| ((tensor / 255) - 0.1307) / 0.3081)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    [(item.label as i64).elem::<B::IntElem>()],
                    &self.device,
                )
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    type TestBackend = NdArray<f32>;

    fn item(fill: f32, label: u8) -> MnistItem {
        MnistItem {
            image: [[fill; 28]; 28],
            label,
        }
    }

    #[test]
    fn batch_stacks_items_into_expected_shapes() {
        let batcher = MnistBatcher::<TestBackend>::new(NdArrayDevice::Cpu);

        let batch = batcher.batch(vec![item(0.0, 7), item(255.0, 2), item(128.0, 9)]);

        assert_eq!(batch.images.dims(), [3, 1, 28, 28]);
        assert_eq!(batch.targets.dims(), [3]);
        assert_eq!(
            batch.targets.into_data(),
            TensorData::from([7i64, 2, 9]).convert::<i64>()
        );
    }

    #[test]
    fn batch_normalizes_pixel_values() {
        let batcher = MnistBatcher::<TestBackend>::new(NdArrayDevice::Cpu);

        let batch = batcher.batch(vec![item(0.0, 0), item(255.0, 1)]);

        let pixels = batch.images.slice([0..2, 0..1, 0..1, 0..1]).into_data();
        let expected = [(0.0f32 - 0.1307) / 0.3081, (1.0f32 - 0.1307) / 0.3081];
        pixels.assert_approx_eq(
            &TensorData::from([[[[expected[0]]]], [[[expected[1]]]]]),
            3,
        );
    }
}

use crate::data::cifar10::{CHANNELS, Cifar10Item, HEIGHT, WIDTH};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

/// Per-channel (R, G, B) mean of the CIFAR-10 training images, in `[0, 1]`.
pub const MEAN: [f32; CHANNELS] = [0.4915, 0.4823, 0.4468];
/// Per-channel (R, G, B) standard deviation of the CIFAR-10 training images, in `[0, 1]`.
pub const STD: [f32; CHANNELS] = [0.2470, 0.2435, 0.2616];

#[derive(Clone, Default)]
pub struct Cifar10Batcher {}

#[derive(Clone, Debug)]
pub struct Cifar10Batch<B: Backend> {
    /// Intensities scaled to `[0, 1]`, then normalized per channel with [`MEAN`] and [`STD`]:
    ///
    /// * `z = (value / 255 - mean) / std`.
    ///
    /// # Shape
    /// [batch_size, CHANNELS, HEIGHT, WIDTH]
    pub images: Tensor<B, 4>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, Cifar10Item, Cifar10Batch<B>> for Cifar10Batcher {
    fn batch(&self, items: Vec<Cifar10Item>, device: &B::Device) -> Cifar10Batch<B> {
        let batch_size = items.len();
        let (items_image, items_label): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.image, item.label))
            .unzip();

        let pixels: Vec<_> = items_image.into_iter().flatten().collect();
        let data = TensorData::new(pixels, [batch_size, CHANNELS, HEIGHT, WIDTH])
            .convert::<B::FloatElem>();
        let images = Tensor::<B, 4>::from_data(data, device);

        let mean = Tensor::<B, 1>::from_floats(MEAN, device).reshape([1, CHANNELS, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, device).reshape([1, CHANNELS, 1, 1]);
        let images = ((images / 255) - mean) / std;

        let labels: Vec<i64> = items_label.into_iter().map(|label| label as i64).collect();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]).convert::<B::IntElem>(),
            device,
        );

        Cifar10Batch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    fn item(label: u8, rgb: [f32; CHANNELS]) -> Cifar10Item {
        let image = rgb
            .iter()
            .flat_map(|value| std::iter::repeat_n(*value, HEIGHT * WIDTH))
            .collect();
        Cifar10Item { image, label }
    }

    #[test]
    fn normalizes_each_channel() {
        let device = Default::default();
        let batch: Cifar10Batch<TestBackend> = Cifar10Batcher::default().batch(
            vec![item(2, [0., 127.5, 255.]), item(7, [255., 0., 0.])],
            &device,
        );
        assert_eq!(batch.images.dims(), [2, CHANNELS, HEIGHT, WIDTH]);
        assert_eq!(batch.targets.to_data().to_vec::<i64>().unwrap(), vec![2, 7]);

        let pixel = |b: usize, c: usize| -> f32 {
            batch
                .images
                .clone()
                .slice([b..b + 1, c..c + 1, 5..6, 9..10])
                .into_scalar()
        };
        let expected = |value: f32, c: usize| (value / 255. - MEAN[c]) / STD[c];
        assert!((pixel(0, 0) - expected(0., 0)).abs() < 1e-5);
        assert!((pixel(0, 1) - expected(127.5, 1)).abs() < 1e-5);
        assert!((pixel(0, 2) - expected(255., 2)).abs() < 1e-5);
        assert!((pixel(1, 0) - expected(255., 0)).abs() < 1e-5);
    }
}

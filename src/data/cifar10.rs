use crate::backend::Element;
use crate::error::{Error, IoContext, Result};
use burn_dataset::network::downloader::download_file_as_bytes;
use burn_dataset::transform::{Mapper, MapperDataset, PartialDataset, ShuffledDataset};
use burn_dataset::{Dataset, InMemDataset};
use flate2::read::GzDecoder;
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// binary version, https://www.cs.toronto.edu/~kriz/cifar.html
const URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const ARCHIVE_DIR: &str = "cifar-10-batches-bin";
const TRAIN_BATCHES: [&str; 5] = [
    "data_batch_1.bin",
    "data_batch_2.bin",
    "data_batch_3.bin",
    "data_batch_4.bin",
    "data_batch_5.bin",
];
const TEST_BATCH: &str = "test_batch.bin";

pub const WIDTH: usize = 32;
pub const HEIGHT: usize = 32;
pub const CHANNELS: usize = 3;
pub const NUM_CLASSES: usize = 10;
/// One label byte followed by the `CHANNELS x HEIGHT x WIDTH` pixel bytes.
pub const RECORD_LEN: usize = 1 + CHANNELS * HEIGHT * WIDTH;

/// Training images kept for training; the remaining 5,000 validate.
pub const TRAIN_LEN: usize = 45_000;

/// CIFAR-10 item.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Cifar10Item {
    /// Image as a flat, channel-major array of floats.
    /// Each value is an intensity, in between 0.0 and 255.0.
    ///
    /// # Shape
    /// [CHANNELS * HEIGHT * WIDTH]
    pub image: Vec<Element>,

    /// Label of the image, in between 0 and 9.
    pub label: u8,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Cifar10ItemRaw {
    pub image_bytes: Vec<u8>,
    pub label: u8,
}

struct BytesToImage;

impl Mapper<Cifar10ItemRaw, Cifar10Item> for BytesToImage {
    fn map(&self, item: &Cifar10ItemRaw) -> Cifar10Item {
        debug_assert_eq!(item.image_bytes.len(), CHANNELS * HEIGHT * WIDTH);

        let image: Vec<Element> = item
            .image_bytes
            .iter()
            .map(|intensity| {
                let element: Element = (*intensity).as_();
                element
            })
            .collect();

        Cifar10Item {
            image,
            label: item.label,
        }
    }
}

/// Splits a `.bin` batch file into raw items.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Cifar10ItemRaw>> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(Error::Dataset(format!(
            "batch of {} bytes is not a multiple of the {RECORD_LEN}-byte record",
            bytes.len()
        )));
    }
    bytes
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let label = record[0];
            if label as usize >= NUM_CLASSES {
                return Err(Error::Dataset(format!("invalid label {label}")));
            }
            Ok(Cifar10ItemRaw {
                image_bytes: record[1..].to_vec(),
                label,
            })
        })
        .collect()
}

/// The CIFAR-10 dataset consists of 60,000 32x32 colour images in 10 classes, with 6,000 images
/// per class. There are 50,000 training images and 10,000 test images.
///
/// The training images are further split into [`TRAIN_LEN`] training and 5,000 validation images.
pub struct Cifar10Dataset {
    dataset: Box<dyn Dataset<Cifar10Item>>,
}

impl Dataset<Cifar10Item> for Cifar10Dataset {
    fn get(&self, index: usize) -> Option<Cifar10Item> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl Cifar10Dataset {
    /// In-memory dataset over already parsed items.
    pub fn from_items(items: Vec<Cifar10ItemRaw>) -> Self {
        let dataset = InMemDataset::new(items);
        let dataset = MapperDataset::new(dataset, BytesToImage);
        Self {
            dataset: Box::new(dataset),
        }
    }

    /// Training and validation splits, from a seeded shuffle of the training images.
    pub fn train_validation(seed: u64) -> Result<(Self, Self)> {
        let root = Self::download()?;
        let mut items = Vec::with_capacity(50_000);
        for batch in TRAIN_BATCHES {
            items.extend(Self::read_batch(&root.join(batch))?);
        }
        Ok(Self::from_items(items).split(TRAIN_LEN, seed))
    }

    /// Creates the test dataset.
    pub fn test() -> Result<Self> {
        let root = Self::download()?;
        let items = Self::read_batch(&root.join(TEST_BATCH))?;
        Ok(Self::from_items(items))
    }

    /// Shuffles with `seed`, then takes the first `first_len` items apart from the rest.
    pub fn split(self, first_len: usize, seed: u64) -> (Self, Self) {
        let len = self.len();
        let first_len = first_len.min(len);
        let shuffled = Arc::new(ShuffledDataset::new(self, seed));
        let first = PartialDataset::new(Arc::clone(&shuffled), 0, first_len);
        let second = PartialDataset::new(shuffled, first_len, len);
        (
            Self {
                dataset: Box::new(first),
            },
            Self {
                dataset: Box::new(second),
            },
        )
    }

    /// Downloads and unpacks the archive into the burn-dataset cache directory, once.
    fn download() -> Result<PathBuf> {
        let cache_dir = dirs::home_dir()
            .ok_or_else(|| Error::Dataset("could not get the home directory".into()))?
            .join(".cache")
            .join("burn-dataset")
            .join("cifar10");
        let root = cache_dir.join(ARCHIVE_DIR);
        if root.join(TEST_BATCH).exists() {
            return Ok(root);
        }

        std::fs::create_dir_all(&cache_dir).at(&cache_dir)?;
        tracing::info!("Downloading CIFAR-10 into {cache_dir:?}");
        let bytes = download_file_as_bytes(URL, "cifar-10-binary.tar.gz");
        let mut archive = tar::Archive::new(GzDecoder::new(&bytes[..]));
        archive.unpack(&cache_dir).at(&cache_dir)?;

        Ok(root)
    }

    fn read_batch(path: &Path) -> Result<Vec<Cifar10ItemRaw>> {
        let bytes = std::fs::read(path).at(path)?;
        parse_records(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: u8, fill: u8) -> Vec<u8> {
        let mut record = vec![fill; RECORD_LEN];
        record[0] = label;
        record
    }

    #[test]
    fn parses_label_then_pixels() {
        let mut bytes = record(3, 7);
        bytes.extend(record(9, 200));
        let items = parse_records(&bytes).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, 3);
        assert_eq!(items[1].label, 9);
        assert_eq!(items[1].image_bytes.len(), CHANNELS * HEIGHT * WIDTH);
        assert!(items[1].image_bytes.iter().all(|b| *b == 200));
    }

    #[test]
    fn rejects_truncated_or_mislabelled_batches() {
        let bytes = record(1, 0);
        assert!(matches!(
            parse_records(&bytes[..RECORD_LEN - 1]),
            Err(Error::Dataset(_))
        ));
        assert!(matches!(
            parse_records(&record(10, 0)),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn split_is_disjoint_and_seeded() {
        // the fill byte identifies each item
        let items = |n: u8| {
            (0..n)
                .map(|i| Cifar10ItemRaw {
                    image_bytes: vec![i; CHANNELS * HEIGHT * WIDTH],
                    label: i % 10,
                })
                .collect::<Vec<_>>()
        };
        let ids = |dataset: &Cifar10Dataset| {
            dataset
                .iter()
                .map(|item| item.image[0] as u8)
                .collect::<Vec<u8>>()
        };

        let (train, valid) = Cifar10Dataset::from_items(items(20)).split(15, 42);
        assert_eq!(train.len(), 15);
        assert_eq!(valid.len(), 5);

        let mut all = ids(&train);
        all.extend(ids(&valid));
        all.sort();
        assert_eq!(all, (0..20).collect::<Vec<u8>>());

        let (train_again, _) = Cifar10Dataset::from_items(items(20)).split(15, 42);
        assert_eq!(ids(&train), ids(&train_again));
    }
}

mod batcher;
mod cifar10;

pub use batcher::{Cifar10Batch, Cifar10Batcher, MEAN, STD};
pub use cifar10::{
    CHANNELS, Cifar10Dataset, Cifar10Item, Cifar10ItemRaw, HEIGHT, NUM_CLASSES,
    RECORD_LEN, TRAIN_LEN, WIDTH, parse_records,
};

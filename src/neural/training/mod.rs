pub mod supervised;

pub use supervised::{
    staircase_lr, train_comparator, EpochResult, TrainingConfig, TrainingReport,
};

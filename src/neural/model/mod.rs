pub mod comparator;
pub mod symmetric;

pub use comparator::{
    ComparatorConfig, PairwiseComparator, FIRST_NOT_WORSE, FIRST_WORSE, NUM_CLASSES,
};
pub use symmetric::{SymmetricLinear, SymmetricLinearConfig};

pub mod batch;
pub mod normalize;
pub mod pairs;

pub use batch::BatchCursor;
pub use normalize::Normalizer;
pub use pairs::{combine, shuffle_and_split, ComparisonPair, PairCategory};

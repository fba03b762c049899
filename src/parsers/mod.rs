pub mod lcov;

pub use lcov::{parse, LcovParser};

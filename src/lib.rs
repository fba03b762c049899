pub mod cli;
pub mod error;
pub mod model;
pub mod parsers;
pub mod report;

pub use model::CoverageModel;
pub use parsers::{parse, LcovParser};
pub use report::render;

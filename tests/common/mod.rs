use lcov_cobertura::LcovParser;

/// Timestamp used by every golden file.
pub const TIMESTAMP: i64 = 1346815648;

/// Parser with a fixed timestamp so rendered output is reproducible.
pub fn parser() -> LcovParser {
    LcovParser::new().timestamp(TIMESTAMP)
}

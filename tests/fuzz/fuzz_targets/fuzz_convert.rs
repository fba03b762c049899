#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing and rendering must not panic on any input.
    let text = String::from_utf8_lossy(data);
    let model = lcov_cobertura::LcovParser::new().timestamp(0).parse(&text);
    let _ = lcov_cobertura::render(&model);
});

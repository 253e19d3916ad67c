#![no_main]

use libfuzzer_sys::fuzz_target;
use wrenconform::harness::executor::decode;
use wrenconform::{Directive, RunKind, RunOutcome, compare, parse_expectations};

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a test file and, split in half, as captured output
    let (source, _) = decode(data);
    if let Directive::Run(expectations) = parse_expectations(&source) {
        let mid = data.len() / 2;
        let outcome = RunOutcome::from_bytes(&data[..mid], &data[mid..], expectations.exit_code);
        let _ = compare(&expectations, &outcome, RunKind::Test);
    }
});

#![no_main]

use libfuzzer_sys::fuzz_target;
use pillar_ca_policy::{GlobPredicateEvaluator, PredicateEvaluator, RequesterIdentity};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let text: &str = &text;
    let (expression, id) = text.split_once('\n').unwrap_or((text, "web01.example.org"));
    let identity = RequesterIdentity::new(id).with_attribute("os", "Debian");

    let first = GlobPredicateEvaluator.evaluate(expression, &identity);
    let second = GlobPredicateEvaluator.evaluate(expression, &identity);
    assert_eq!(first, second);
    let _ = first.as_str();
});

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let keywords = linenav::query::parse_keywords(data);
    for keyword in &keywords {
        assert!(!keyword.text.is_empty());
        assert_eq!(keyword.text.trim(), keyword.text);
    }
});

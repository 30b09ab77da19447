#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use linenav::format::ResultFormatter;
use linenav::query::parse_keywords;
use linenav::scope::ScopeKind;
use linenav::search::native::match_text;
use linenav::search::KeywordSet;
use std::path::Path;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    text: &'a str,
    query: &'a str,
    max_width: u8,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(set) = KeywordSet::new(&parse_keywords(input.query)) else {
        return;
    };
    let hits = match_text(Path::new("fuzz.txt"), input.text, &set);
    let formatter = ResultFormatter::new(input.max_width as usize);

    for entry in formatter.format(&hits, ScopeKind::Folder) {
        assert!(entry.width() <= formatter.max_width());
        for span in &entry.spans {
            assert!(entry.text.is_char_boundary(span.start));
            assert!(entry.text.is_char_boundary(span.end));
        }
    }
});

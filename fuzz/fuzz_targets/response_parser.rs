#![no_main]

use libfuzzer_sys::fuzz_target;

use pagesift::ContentKind;
use pagesift::extraction::parse::parse_partial;
use pagesift::patterns::oracle::parse_oracle_response;

fuzz_target!(|data: &[u8]| {
    // Backend replies are free-form text; the parsers must never panic on them.
    let raw = String::from_utf8_lossy(data);

    let _ = parse_partial(ContentKind::Article, &raw);
    let _ = parse_partial(ContentKind::Job, &raw);
    let _ = parse_oracle_response(&raw);
});

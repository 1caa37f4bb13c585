//! Merging of per-chunk partial records into one record per page.

use crate::classifier::{ContentKind, LinkRecord};
use crate::extraction::ExtractedRecord;
use tracing::warn;

/// Fold `partials` in chunk order. For every field the first non-empty value
/// wins; absent partials are skipped.
pub fn merge(kind: ContentKind, partials: &[Option<ExtractedRecord>]) -> ExtractedRecord {
    let mut merged = ExtractedRecord::empty(kind);
    for (index, partial) in partials.iter().enumerate() {
        let Some(partial) = partial else {
            continue;
        };
        if !merged.absorb(partial) {
            warn!(
                chunk = index,
                expected = %kind,
                found = %partial.kind(),
                "partial of the wrong kind ignored"
            );
        }
    }
    merged
}

/// [`merge`], then stamp the page's own URL into the source field
/// (`Link` for articles, `Information source` for jobs), replacing whatever
/// the backend produced.
pub fn reconcile(link: &LinkRecord, partials: &[Option<ExtractedRecord>]) -> ExtractedRecord {
    let mut record = merge(link.kind(), partials);
    record.set_source_url(link.url().as_str());
    record
}

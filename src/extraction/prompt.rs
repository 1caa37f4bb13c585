use crate::classifier::ContentKind;
use crate::extraction::record::ExtractedRecord;

fn subject(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Article => "an article",
        ContentKind::Job => "a job posting",
    }
}

/// Empty JSON template listing exactly the fields of `kind`.
fn template(kind: ContentKind) -> String {
    let fields = ExtractedRecord::keys(kind)
        .iter()
        .map(|key| format!("  \"{key}\": \"\""))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{{\n{fields}\n}}")
}

/// Instruction for one chunk of a page of `kind`.
pub fn for_chunk(kind: ContentKind, chunk: &str) -> String {
    let subject = subject(kind);
    format!(
        "The text below is one PART of {subject}, not the whole page.\n\
         Fill in this JSON object and reply with the object only, using these fields and no others:\n\
         {template}\n\n\
         Leave a field as \"\" when this part does not mention it.\n\
         Text:\n{chunk}\n",
        template = template(kind),
    )
}

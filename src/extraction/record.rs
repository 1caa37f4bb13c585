use crate::classifier::ContentKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "Summary", default)]
    pub summary: String,
    #[serde(rename = "Publication Date", default)]
    pub publication_date: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Link", default)]
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "Company", default)]
    pub company: String,
    #[serde(rename = "Position", default)]
    pub position: String,
    #[serde(rename = "Contact person", default)]
    pub contact_person: String,
    #[serde(rename = "Contact email", default)]
    pub contact_email: String,
    #[serde(rename = "Mobile number", default)]
    pub mobile_number: String,
    #[serde(rename = "Comments", default)]
    pub comments: String,
    #[serde(rename = "Information source", default)]
    pub information_source: String,
}

/// The structured result for one page. Also used for per-chunk partials,
/// where any field may still be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtractedRecord {
    Article(ArticleRecord),
    Job(JobRecord),
}

/// Fill `slot` from `value` only while `slot` is still empty.
fn fill(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.is_empty() {
        *slot = value.to_string();
    }
}

/// Lowercase with everything but letters and digits removed, so that
/// `"Publication Date"`, `"publication_date"` and `"PublicationDate"` agree.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl ArticleRecord {
    pub const KEYS: [&'static str; 5] = ["Title", "Summary", "Publication Date", "Category", "Link"];

    fn slot_mut(&mut self, normalized_key: &str) -> Option<&mut String> {
        match normalized_key {
            "title" => Some(&mut self.title),
            "summary" => Some(&mut self.summary),
            "publicationdate" => Some(&mut self.publication_date),
            "category" => Some(&mut self.category),
            "link" => Some(&mut self.link),
            _ => None,
        }
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.title, &other.title);
        fill(&mut self.summary, &other.summary);
        fill(&mut self.publication_date, &other.publication_date);
        fill(&mut self.category, &other.category);
        fill(&mut self.link, &other.link);
    }

    fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

impl JobRecord {
    pub const KEYS: [&'static str; 7] = [
        "Company",
        "Position",
        "Contact person",
        "Contact email",
        "Mobile number",
        "Comments",
        "Information source",
    ];

    fn slot_mut(&mut self, normalized_key: &str) -> Option<&mut String> {
        match normalized_key {
            "company" => Some(&mut self.company),
            "position" => Some(&mut self.position),
            "contactperson" => Some(&mut self.contact_person),
            "contactemail" => Some(&mut self.contact_email),
            "mobilenumber" => Some(&mut self.mobile_number),
            "comments" => Some(&mut self.comments),
            "informationsource" => Some(&mut self.information_source),
            _ => None,
        }
    }

    fn absorb(&mut self, other: &Self) {
        fill(&mut self.company, &other.company);
        fill(&mut self.position, &other.position);
        fill(&mut self.contact_person, &other.contact_person);
        fill(&mut self.contact_email, &other.contact_email);
        fill(&mut self.mobile_number, &other.mobile_number);
        fill(&mut self.comments, &other.comments);
        fill(&mut self.information_source, &other.information_source);
    }

    fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

impl ExtractedRecord {
    /// A record of `kind` with every field empty.
    pub fn empty(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Article => Self::Article(ArticleRecord::default()),
            ContentKind::Job => Self::Job(JobRecord::default()),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Article(_) => ContentKind::Article,
            Self::Job(_) => ContentKind::Job,
        }
    }

    /// Display keys of the fields for `kind`, in output order.
    pub fn keys(kind: ContentKind) -> &'static [&'static str] {
        match kind {
            ContentKind::Article => &ArticleRecord::KEYS,
            ContentKind::Job => &JobRecord::KEYS,
        }
    }

    /// Mutable access to a field by any spelling of its key. Keys outside
    /// the variant's field set return `None`.
    pub fn slot_mut(&mut self, key: &str) -> Option<&mut String> {
        let normalized = normalize_key(key);
        match self {
            Self::Article(record) => record.slot_mut(&normalized),
            Self::Job(record) => record.slot_mut(&normalized),
        }
    }

    /// Copy every non-empty field of `other` into a still-empty field of
    /// `self`. Returns `false` and changes nothing when the variants differ.
    pub fn absorb(&mut self, other: &Self) -> bool {
        match (self, other) {
            (Self::Article(acc), Self::Article(partial)) => {
                acc.absorb(partial);
                true
            }
            (Self::Job(acc), Self::Job(partial)) => {
                acc.absorb(partial);
                true
            }
            _ => false,
        }
    }

    /// Overwrite the field that records where the page came from.
    pub fn set_source_url(&mut self, url: &str) {
        match self {
            Self::Article(record) => record.link = url.to_string(),
            Self::Job(record) => record.information_source = url.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Article(record) => record.is_blank(),
            Self::Job(record) => record.is_blank(),
        }
    }
}

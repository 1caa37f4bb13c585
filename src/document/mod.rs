//! Read-only view of an HTML document: hyperlinks, labelled controls, and
//! visible text.
//!
//! `scraper::Html` is not `Send`, so documents are parsed and queried inside
//! synchronous calls and only owned results leave this module.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// Elements whose text is never shown to a reader.
const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// A hyperlink with its target resolved to an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub text: String,
    pub href: Url,
}

/// An element found by its visible label. `target` is `None` when the element
/// has no usable href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledControl {
    pub text: String,
    pub target: Option<Url>,
}

pub struct HtmlDocument {
    html: Html,
}

fn label_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn resolve(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base.join(href) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!(base = %base, href, error = %e, "unresolvable href skipped");
            None
        }
    }
}

impl HtmlDocument {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// Every `<a>` with a non-empty href, in document order.
    pub fn links(&self, base: &Url) -> Vec<Anchor> {
        self.html
            .select(&ANCHOR_SELECTOR)
            .filter_map(|element| {
                let href = resolve(base, element.value().attr("href")?)?;
                Some(Anchor {
                    text: label_of(&element),
                    href,
                })
            })
            .collect()
    }

    /// The first `<a>` whose trimmed visible text equals `label`.
    pub fn find_by_label(&self, label: &str, base: &Url) -> Option<LabeledControl> {
        let element = self
            .html
            .select(&ANCHOR_SELECTOR)
            .find(|element| label_of(element) == label)?;

        Some(LabeledControl {
            text: label.to_string(),
            target: element
                .value()
                .attr("href")
                .and_then(|href| resolve(base, href)),
        })
    }

    /// Text nodes outside script/style content, each trimmed, joined with a
    /// single space.
    pub fn visible_text(&self) -> String {
        let mut parts = Vec::new();
        for node in self.html.root_element().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                matches!(ancestor.value(), Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()))
            });
            if hidden {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
        parts.join(" ")
    }
}

/// Visible text of an HTML string.
pub fn visible_text(body: &str) -> String {
    HtmlDocument::parse(body).visible_text()
}

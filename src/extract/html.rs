// src/extract/html.rs
// =============================================================================
// This module extracts candidate email addresses from an HTML page.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever, which never rejects a document: broken markup
//   just produces a slightly odd tree, so extraction can't fail
//
// Seven methods run on every page and their results are unioned:
//   1. regex over the raw HTML text
//   2. mailto: link targets
//   3. regex over the visible (tag-stripped, entity-decoded) text
//   4. regex over every attribute value (placeholders, data-*, hidden inputs)
//   5. regex over <meta content="...">
//   6. regex over inline <script> bodies
//   7. regex over HTML comments
//
// Methods overlap a lot on purpose. ExtractionStats records how many
// addresses each method found that no other method did.
// =============================================================================

use once_cell::sync::Lazy;
use scraper::{Html, Node, Selector};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use url::form_urlencoded;

use super::patterns::{is_structurally_valid, scan_into};

// Constant selectors: parsing can only fail for a malformed selector string,
// which would be a programmer error caught by the tests below
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static ANY_ELEMENT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("*").expect("valid universal selector"));
static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[content]").expect("valid meta selector"));
static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("valid script selector"));

// Elements that break the flow of text when rendered
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// One of the independent ways an address can be found on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    RawRegex,
    Mailto,
    VisibleText,
    Attributes,
    Meta,
    Script,
    Comments,
}

impl ExtractionMethod {
    pub const ALL: [ExtractionMethod; 7] = [
        ExtractionMethod::RawRegex,
        ExtractionMethod::Mailto,
        ExtractionMethod::VisibleText,
        ExtractionMethod::Attributes,
        ExtractionMethod::Meta,
        ExtractionMethod::Script,
        ExtractionMethod::Comments,
    ];
}

/// Per-method counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MethodCount {
    /// Addresses this method found
    pub found: usize,
    /// Addresses only this method found
    pub unique: usize,
}

/// Diagnostics for one or more extraction runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub per_method: BTreeMap<ExtractionMethod, MethodCount>,
}

impl ExtractionStats {
    /// Adds another page's counters to this one
    pub fn merge(&mut self, other: &ExtractionStats) {
        for (method, count) in &other.per_method {
            let entry = self.per_method.entry(*method).or_default();
            entry.found += count.found;
            entry.unique += count.unique;
        }
    }
}

/// Extracts all candidate emails from an HTML document
///
/// Example:
///   html = `<a href="mailto:joe@acme.com?subject=hi">Contact</a><p>Reach sue@acme.com</p>`
///   result = {"joe@acme.com", "sue@acme.com"}
pub fn extract_emails(html: &str) -> BTreeSet<String> {
    extract_with_stats(html).0
}

/// Same as extract_emails, plus which method contributed what
pub fn extract_with_stats(html: &str) -> (BTreeSet<String>, ExtractionStats) {
    if html.trim().is_empty() {
        return (BTreeSet::new(), ExtractionStats::default());
    }

    let document = Html::parse_document(html);

    let mut by_method: BTreeMap<ExtractionMethod, BTreeSet<String>> = BTreeMap::new();
    for method in ExtractionMethod::ALL {
        let mut found = BTreeSet::new();
        match method {
            ExtractionMethod::RawRegex => scan_into(html, &mut found),
            ExtractionMethod::Mailto => collect_mailto(&document, &mut found),
            ExtractionMethod::VisibleText => collect_visible_text(&document, &mut found),
            ExtractionMethod::Attributes => collect_attributes(&document, &mut found),
            ExtractionMethod::Meta => collect_meta(&document, &mut found),
            ExtractionMethod::Script => collect_scripts(&document, &mut found),
            ExtractionMethod::Comments => collect_comments(&document, &mut found),
        }
        by_method.insert(method, found);
    }

    // How many methods saw each address
    let mut seen_by: BTreeMap<&str, usize> = BTreeMap::new();
    for found in by_method.values() {
        for email in found {
            *seen_by.entry(email.as_str()).or_default() += 1;
        }
    }

    let mut stats = ExtractionStats::default();
    for (method, found) in &by_method {
        let unique = found
            .iter()
            .filter(|email| seen_by.get(email.as_str()) == Some(&1))
            .count();
        stats.per_method.insert(
            *method,
            MethodCount {
                found: found.len(),
                unique,
            },
        );
    }

    let emails: BTreeSet<String> = seen_by.keys().map(|email| email.to_string()).collect();
    tracing::trace!(target: "extract", "{} candidate(s) on page", emails.len());
    (emails, stats)
}

fn collect_mailto(document: &Html, found: &mut BTreeSet<String>) {
    for element in document.select(&ANCHOR_SELECTOR) {
        if let Some(href) = element.value().attr("href") {
            for email in decode_mailto(href) {
                if is_structurally_valid(&email) {
                    found.insert(email);
                }
            }
        }
    }
}

// Turns "mailto:Joe%40acme.com,sue@acme.com?subject=hi" into
// ["joe@acme.com", "sue@acme.com"]
fn decode_mailto(href: &str) -> Vec<String> {
    let href = href.trim();
    let is_mailto = href
        .get(..7)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("mailto:"));
    if !is_mailto {
        return Vec::new();
    }

    let target = href[7..].split('?').next().unwrap_or("");

    // form_urlencoded would turn '+' into a space, but '+' is legal in a
    // local part, so escape it first
    let escaped = target.replace('+', "%2B");
    let decoded = form_urlencoded::parse(escaped.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default();

    decoded
        .split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}

// Text nodes are glued back together as the browser renders them, so
// "jane<span>@</span>acme.com" reads "jane@acme.com" again. Only block
// elements start a new word.
fn collect_visible_text(document: &Html, found: &mut BTreeSet<String>) {
    let mut text = String::new();
    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Text(chunk) => text.push_str(chunk),
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => text.push(' '),
            _ => {}
        }
    }
    scan_into(&text, found);
}

fn collect_attributes(document: &Html, found: &mut BTreeSet<String>) {
    for element in document.select(&ANY_ELEMENT_SELECTOR) {
        for (_name, value) in element.value().attrs() {
            scan_into(value, found);
        }
    }
}

fn collect_meta(document: &Html, found: &mut BTreeSet<String>) {
    for element in document.select(&META_SELECTOR) {
        if let Some(content) = element.value().attr("content") {
            scan_into(content, found);
        }
    }
}

fn collect_scripts(document: &Html, found: &mut BTreeSet<String>) {
    for element in document.select(&SCRIPT_SELECTOR) {
        let body: String = element.text().collect();
        scan_into(&body, found);
    }
}

fn collect_comments(document: &Html, found: &mut BTreeSet<String>) {
    for node in document.tree.values() {
        if let Node::Comment(comment) = node {
            scan_into(comment, found);
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why BTreeSet instead of HashSet?
//    - Both store unique items
//    - BTreeSet keeps them sorted, so output (and tests) are deterministic
//    - Extraction must be idempotent: same HTML in, same set out
//
// 2. What is Lazy?
//    - once_cell::sync::Lazy runs its closure the first time it's used
//    - The selector is parsed once and shared by every call afterwards
//
// 3. What is document.tree?
//    - scraper keeps the parsed DOM in an ego_tree::Tree<Node>
//    - CSS selectors only match elements, so comments are found by walking
//      the raw node list and matching on Node::Comment
// -----------------------------------------------------------------------------

// ABOUTME: Selector-driven extraction of comment fragments and document fields from records.
// ABOUTME: Produces the ThreadFragments and DocumentFields the tree builder consumes.

//! Fragment extraction.
//!
//! Every selector of a profile is run against the record's comment HTML in
//! document order. A matched element contributes its text with whitespace
//! collapsed; elements without text are skipped.
//!
//! Dates are looked up per comment rather than across the document: starting
//! at the matched element, the search widens one ancestor at a time and stops
//! before entering an ancestor that holds another comment. A comment skipped
//! for having no text takes its date with it.

use dom_query::{Document, Matcher, Selection};
use threadset_corpus::{DocumentFields, ThreadFragments};

use crate::compiled::matcher_for;
use crate::date::normalize_date;
use crate::profiles::{SelectorSet, SourceProfile};
use crate::record::XmlRecord;

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Texts of every element matching `css`, in document order.
pub fn extract_texts(doc: &Document, css: &str) -> Vec<String> {
    let Some(matcher) = matcher_for(css) else {
        tracing::warn!(css, "invalid selector; no matches");
        return vec![];
    };
    doc.select_matcher(&matcher)
        .iter()
        .filter_map(|el| {
            let normalized = normalize_whitespace(&el.text());
            (!normalized.is_empty()).then_some(normalized)
        })
        .collect()
}

/// First non-empty date inside the comment block that contains `comment`.
fn comment_date(comment: &Selection, all: &Matcher, date: &Matcher) -> Option<String> {
    let mut scope = comment.clone();
    loop {
        let found = scope
            .select_matcher(date)
            .iter()
            .map(|d| normalize_whitespace(&d.text()))
            .find(|d| !d.is_empty());
        if found.is_some() {
            return found;
        }
        let parent = scope.parent();
        if parent.is_empty() || parent.select_matcher(all).length() > 1 {
            return None;
        }
        scope = parent;
    }
}

/// Comment texts matched by `all_css`, each paired with its own normalised date (empty when undated).
fn extract_comments(doc: &Document, all_css: &str, date_css: Option<&str>) -> (Vec<String>, Vec<String>) {
    let Some(all) = matcher_for(all_css) else {
        tracing::warn!(css = all_css, "invalid selector; no matches");
        return (vec![], vec![]);
    };
    let date = date_css.and_then(|css| {
        let matcher = matcher_for(css);
        if matcher.is_none() {
            tracing::warn!(css, "invalid date selector; comments stay undated");
        }
        matcher
    });

    let mut texts = Vec::new();
    let mut dates = Vec::new();
    for comment in doc.select_matcher(&all).iter() {
        let text = normalize_whitespace(&comment.text());
        if text.is_empty() {
            continue;
        }
        let created = date
            .as_ref()
            .and_then(|date| comment_date(&comment, &all, date))
            .map(|raw| normalize_date(&raw))
            .unwrap_or_default();
        texts.push(text);
        dates.push(created);
    }
    (texts, dates)
}

/// Runs a selector set over comment HTML.
pub fn extract_fragments(html: &str, selectors: &SelectorSet) -> ThreadFragments {
    let doc = Document::from(html);
    let (all, dates) = extract_comments(&doc, &selectors.all, selectors.date.as_deref());
    ThreadFragments {
        all,
        top: extract_texts(&doc, &selectors.top),
        nested: selectors.nested.as_deref().map(|css| extract_texts(&doc, css)),
        dates: selectors.date.as_ref().map(|_| dates),
    }
}

/// Root-turn fields of a record. Link and author are kept only for profiles that carry them.
pub fn document_fields(record: &XmlRecord, profile: &SourceProfile) -> DocumentFields {
    let (link, author_ref) = if profile.carries_author {
        (record.link.clone(), record.lawyer_name.clone())
    } else {
        (None, None)
    };
    DocumentFields {
        title: record.title.clone(),
        body: record.detail_content.clone().unwrap_or_default(),
        link,
        author_ref,
        created_date: record.registered_date.as_deref().map(normalize_date),
    }
}

//! Audience-analysis entries.
//!
//! Models return these as `"category: description"` strings, as structured
//! objects, or as a map from category to description. Strings are split on
//! their first colon (ASCII or full-width); anything that cannot be tagged
//! gets the generic category.

use serde_json::{Map, Value};

use super::fields::{bilingual_sides, lookup, text_of};
use crate::plan::AudienceEntry;

const CATEGORY_KEYS: &[&str] = &["category", "type", "tag", "aspect", "dimension"];
const DESCRIPTION_KEYS: &[&str] = &[
    "description",
    "desc",
    "detail",
    "details",
    "content",
    "text",
    "analysis",
];
const AGE_KEYS: &[&str] = &["age_range", "ageRange", "age"];
const PROFICIENCY_KEYS: &[&str] = &["proficiency", "level", "language_level", "languageLevel"];
const STYLE_KEYS: &[&str] = &["learning_style", "learningStyle", "style"];

/// Normalize an audience-analysis value of any shape into tagged entries.
pub fn audience_entries(value: &Value) -> Vec<AudienceEntry> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.lines().filter_map(entry_from_str).collect(),
        Value::Array(items) => items.iter().flat_map(audience_entries).collect(),
        Value::Object(obj) => {
            if let Some((zh, en)) = bilingual_sides(value) {
                return en.or(zh).map(audience_entries).unwrap_or_default();
            }
            if is_structured(obj) {
                entry_from_object(obj).into_iter().collect()
            } else {
                entries_from_category_map(obj)
            }
        }
        other => entry_from_str(&text_of(other)).into_iter().collect(),
    }
}

/// Split `"category: description"` on the first colon.
///
/// A string without a colon, or with nothing before it, is tagged
/// [`AudienceEntry::GENERIC_CATEGORY`].
pub fn entry_from_str(raw: &str) -> Option<AudienceEntry> {
    let text = raw.trim().trim_start_matches(['-', '*', '•']).trim();
    if text.is_empty() {
        return None;
    }

    let split = text
        .char_indices()
        .find(|(_, c)| *c == ':' || *c == '：')
        .map(|(idx, c)| (&text[..idx], &text[idx + c.len_utf8()..]));

    let entry = match split {
        Some((category, description)) if !category.trim().is_empty() => {
            AudienceEntry::new(category.trim(), description.trim())
        }
        Some((_, description)) => {
            AudienceEntry::new(AudienceEntry::GENERIC_CATEGORY, description.trim())
        }
        None => AudienceEntry::new(AudienceEntry::GENERIC_CATEGORY, text),
    };
    Some(entry)
}

fn is_structured(obj: &Map<String, Value>) -> bool {
    [CATEGORY_KEYS, DESCRIPTION_KEYS, AGE_KEYS, PROFICIENCY_KEYS, STYLE_KEYS]
        .iter()
        .any(|keys| lookup(obj, keys).is_some())
}

fn entry_from_object(obj: &Map<String, Value>) -> Option<AudienceEntry> {
    let text = |keys: &[&str]| lookup(obj, keys).map(text_of).filter(|s| !s.is_empty());

    let entry = AudienceEntry {
        category: text(CATEGORY_KEYS)
            .unwrap_or_else(|| AudienceEntry::GENERIC_CATEGORY.to_string()),
        description: text(DESCRIPTION_KEYS).unwrap_or_default(),
        age_range: text(AGE_KEYS),
        proficiency: text(PROFICIENCY_KEYS),
        learning_style: text(STYLE_KEYS),
    };

    let has_content = !entry.description.is_empty()
        || entry.age_range.is_some()
        || entry.proficiency.is_some()
        || entry.learning_style.is_some();
    has_content.then_some(entry)
}

fn entries_from_category_map(obj: &Map<String, Value>) -> Vec<AudienceEntry> {
    obj.iter()
        .filter_map(|(category, description)| {
            let description = text_of(description);
            (!description.is_empty()).then(|| AudienceEntry::new(category.trim(), description))
        })
        .collect()
}

//! Field lookup and coercion over loosely shaped JSON.
//!
//! Every reader here accepts several spellings of a key (snake case, camel
//! case, legacy names) and several value shapes, and produces the one
//! canonical Rust type. None of them fail: absent or unusable input yields
//! an empty value, which the validator decides about later.

use serde_json::{Map, Value};

use crate::plan::{Bilingual, BilingualList, BilingualText};

/// Side keys of a bilingual object, primary language first.
const ZH_SIDE_KEYS: &[&str] = &["zh", "cn", "chinese", "primary"];
const EN_SIDE_KEYS: &[&str] = &["en", "english", "secondary"];

/// Key suffixes marking a single-language variant of a field.
const ZH_SUFFIXES: &[&str] = &["_zh", "Zh", "_cn", "Cn", "_ZH", "_CN"];
const EN_SUFFIXES: &[&str] = &["_en", "En", "_EN"];

/// Keys that hold the text of an object-shaped list item.
const ITEM_TEXT_KEYS: &[&str] = &[
    "text",
    "content",
    "description",
    "word",
    "sentence",
    "objective",
    "name",
    "value",
];

/// First value present under any of `aliases`.
pub fn lookup<'a>(map: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|key| map.get(*key))
}

/// True if `map` holds `key` itself or any single-language variant of it.
pub fn has_field(map: &Map<String, Value>, key: &str) -> bool {
    map.contains_key(key)
        || ZH_SUFFIXES
            .iter()
            .chain(EN_SUFFIXES)
            .any(|suffix| map.contains_key(&format!("{key}{suffix}")))
}

/// Every key in `map` that is `key` or a single-language variant of it.
pub fn field_keys(map: &Map<String, Value>, key: &str) -> Vec<String> {
    map.keys()
        .filter(|k| {
            k.as_str() == key
                || ZH_SUFFIXES
                    .iter()
                    .chain(EN_SUFFIXES)
                    .any(|suffix| k.strip_suffix(suffix) == Some(key))
        })
        .cloned()
        .collect()
}

/// Read a bilingual text field.
///
/// For each alias in priority order, accepts a `{zh, en}` object, suffixed
/// single-language keys, or a bare value. The first alias that yields
/// anything wins; the missing side is mirrored from the present one.
pub fn bilingual_text(map: &Map<String, Value>, aliases: &[&str]) -> BilingualText {
    read_bilingual(map, aliases, text_of).mirrored()
}

/// Read a bilingual list field. Lists are always arrays, whatever the source shape.
pub fn bilingual_list(map: &Map<String, Value>, aliases: &[&str]) -> BilingualList {
    read_bilingual(map, aliases, list_of).mirrored()
}

fn read_bilingual<T, F>(map: &Map<String, Value>, aliases: &[&str], coerce: F) -> Bilingual<T>
where
    T: Default + Clone + crate::plan::IsBlank,
    F: Fn(&Value) -> T,
{
    for alias in aliases {
        let mut zh: Option<T> = None;
        let mut en: Option<T> = None;

        if let Some(value) = map.get(*alias) {
            if let Some((z, e)) = split_bilingual_items(value) {
                zh = Some(coerce(&z));
                en = Some(coerce(&e));
            } else if let Some((z, e)) = bilingual_sides(value) {
                zh = z.map(&coerce);
                en = e.map(&coerce);
            } else {
                let both = coerce(value);
                zh = Some(both.clone());
                en = Some(both);
            }
        }

        if is_blank_opt(&zh) {
            if let Some(v) = suffixed(map, alias, ZH_SUFFIXES) {
                zh = Some(coerce(v));
            }
        }
        if is_blank_opt(&en) {
            if let Some(v) = suffixed(map, alias, EN_SUFFIXES) {
                en = Some(coerce(v));
            }
        }

        let found = Bilingual::new(zh.unwrap_or_default(), en.unwrap_or_default());
        if !found.is_blank() {
            return found;
        }
    }
    Bilingual::default()
}

fn is_blank_opt<T: crate::plan::IsBlank>(value: &Option<T>) -> bool {
    value.as_ref().is_none_or(|v| v.is_blank())
}

fn suffixed<'a>(map: &'a Map<String, Value>, key: &str, suffixes: &[&str]) -> Option<&'a Value> {
    suffixes
        .iter()
        .find_map(|suffix| map.get(&format!("{key}{suffix}")))
}

/// Split a `{zh, en}`-style object into its sides. Returns `None` when the
/// value is not such an object.
pub fn bilingual_sides(value: &Value) -> Option<(Option<&Value>, Option<&Value>)> {
    let obj = value.as_object()?;
    let zh = lookup(obj, ZH_SIDE_KEYS);
    let en = lookup(obj, EN_SIDE_KEYS);
    if zh.is_none() && en.is_none() {
        return None;
    }
    Some((zh, en))
}

/// Split an array of `{zh, en}` items into one array per language.
fn split_bilingual_items(value: &Value) -> Option<(Value, Value)> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    let mut zh = Vec::with_capacity(items.len());
    let mut en = Vec::with_capacity(items.len());
    for item in items {
        let (z, e) = bilingual_sides(item)?;
        zh.push(z.or(e).cloned().unwrap_or(Value::Null));
        en.push(e.or(z).cloned().unwrap_or(Value::Null));
    }
    Some((Value::Array(zh), Value::Array(en)))
}

/// Coerce any JSON value to display text.
///
/// Arrays join their items with newlines; objects use a text-like key when
/// present, otherwise their values joined with newlines.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => match lookup(obj, ITEM_TEXT_KEYS) {
            Some(inner) => text_of(inner),
            None => obj
                .values()
                .map(text_of)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        },
    }
}

/// Coerce any JSON value to a list of non-empty strings.
///
/// A bare string becomes its non-empty lines; an object contributes its
/// text-like key or each of its values.
pub fn list_of(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::Object(obj) => match lookup(obj, ITEM_TEXT_KEYS) {
            Some(inner) => list_of(inner),
            None => obj.values().flat_map(list_of).collect(),
        },
        other => {
            let text = text_of(other);
            if text.is_empty() { Vec::new() } else { vec![text] }
        }
    }
}

/// Longest duration, in minutes, accepted from a payload.
pub const MAX_MINUTES: u32 = 600;

/// Read a minute count from a number or from the leading integer of a
/// string such as `"5 minutes"` or `"5分钟"`.
///
/// Counts above [`MAX_MINUTES`] are treated as absent.
pub fn minutes_of(value: &Value) -> Option<u32> {
    let minutes: u64 = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))?,
        Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()?
        }
        _ => return None,
    };
    u32::try_from(minutes).ok().filter(|m| *m <= MAX_MINUTES)
}

/// Plain (single-language) text under any of `aliases`.
pub fn plain_text(map: &Map<String, Value>, aliases: &[&str]) -> String {
    for alias in aliases {
        if let Some(value) = map.get(*alias) {
            let text = match bilingual_sides(value) {
                Some((zh, en)) => en.or(zh).map(text_of).unwrap_or_default(),
                None => text_of(value),
            };
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

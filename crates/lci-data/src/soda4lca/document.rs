//! Interpretation of soda4LCA JSON documents.
//!
//! ILCD process datasets nest their fields several levels deep and the
//! exact nesting differs between node versions, so fields are located by
//! key suffix anywhere in the tree rather than by a fixed path.

use serde::Deserialize;
use serde_json::Value;

const PREFERRED_LANG: &str = "en";

/// Fields of an ILCD process dataset that feed a candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ProcessDocument {
    pub name: Option<String>,
    pub description: Option<String>,
    pub reference_flow: Option<String>,
    pub location: Option<String>,
    pub classification: Option<String>,
}

pub(crate) fn parse_process_document(body: &str) -> Result<ProcessDocument, serde_json::Error> {
    let root: Value = serde_json::from_str(body)?;
    Ok(ProcessDocument {
        name: find_field(&root, &["baseName", "name"]),
        description: find_field(&root, &["generalComment"]),
        reference_flow: find_field(&root, &["referenceFlow"]),
        location: find_field(&root, &["location"]),
        classification: find_field(&root, &["classification", "class"]),
    })
}

/// First suffix that yields text wins.
fn find_field(root: &Value, suffixes: &[&str]) -> Option<String> {
    suffixes.iter().find_map(|suffix| find_by_suffix(root, suffix))
}

fn key_matches(key: &str, suffix: &str) -> bool {
    let key = key.trim_start_matches('@');
    key.len() >= suffix.len()
        && key.is_char_boundary(key.len() - suffix.len())
        && key[key.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn find_by_suffix(value: &Value, suffix: &str) -> Option<String> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key_matches(key, suffix) {
                    if let Some(text) = text_of(child) {
                        return Some(text);
                    }
                }
            }
            map.values().find_map(|child| find_by_suffix(child, suffix))
        }
        Value::Array(items) => items.iter().find_map(|item| find_by_suffix(item, suffix)),
        _ => None,
    }
}

/// Text content of a node.
///
/// Multi-language arrays prefer the English entry; objects contribute their
/// `value` member.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items
            .iter()
            .filter(|item| lang_of(item) == Some(PREFERRED_LANG))
            .find_map(text_of)
            .or_else(|| items.iter().find_map(text_of)),
        Value::Object(map) => map.get("value").and_then(text_of),
        Value::Null => None,
    }
}

fn lang_of(value: &Value) -> Option<&str> {
    let map = value.as_object()?;
    map.get("lang")
        .or_else(|| map.get("@lang"))
        .and_then(Value::as_str)
}

/// One row of a `/processes?search=true` result page.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProcessSearchItem {
    pub uuid: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub classific: Option<String>,
    #[serde(default)]
    pub geo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessSearchPage {
    #[serde(default)]
    data: Vec<ProcessSearchItem>,
}

pub(crate) fn parse_search_page(body: &str) -> Result<Vec<ProcessSearchItem>, serde_json::Error> {
    let page: ProcessSearchPage = serde_json::from_str(body)?;
    Ok(page
        .data
        .into_iter()
        .filter(|item| !item.uuid.trim().is_empty())
        .collect())
}

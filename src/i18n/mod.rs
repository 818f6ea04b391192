/// Locale catalogs and translation completeness checking
///
/// Locale files are JSON objects, arbitrarily nested; a message is
/// addressed by the dot-joined path of keys leading to a string leaf.
/// Completeness is judged purely on key sets against a reference locale.
use crate::error::{AppError, AppResult};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A flattened locale: dot-path -> message
#[derive(Debug, Clone)]
pub struct Locale {
    pub name: String,
    pub messages: BTreeMap<String, String>,
}

impl Locale {
    /// Load a locale from a JSON file. The locale name is the file stem.
    pub fn load(path: &Path) -> AppResult<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AppError::Validation(format!("Bad locale path: {}", path.display())))?
            .to_string();

        let raw = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| AppError::Validation(format!("{}: invalid JSON: {}", name, e)))?;

        let mut messages = BTreeMap::new();
        flatten(&value, String::new(), &mut messages)?;

        Ok(Self { name, messages })
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.messages.keys().map(|k| k.as_str()).collect()
    }
}

/// Walk nested objects, joining keys with dots. Only string leaves are
/// messages; any other leaf type is a malformed catalog.
fn flatten(
    value: &Value,
    prefix: String,
    out: &mut BTreeMap<String, String>,
) -> AppResult<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(child, path, out)?;
            }
            Ok(())
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
            Ok(())
        }
        _ => Err(AppError::Validation(format!(
            "Non-string message at '{}'",
            prefix
        ))),
    }
}

/// Key-set differences of one locale against the reference
#[derive(Debug, Default)]
pub struct LocaleReport {
    pub locale: String,
    /// Keys the reference has but this locale lacks
    pub missing: Vec<String>,
    /// Keys this locale has but the reference lacks
    pub extra: Vec<String>,
}

impl LocaleReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compare a locale's key set against the reference locale
pub fn compare_locales(reference: &Locale, other: &Locale) -> LocaleReport {
    let ref_keys = reference.keys();
    let other_keys = other.keys();

    LocaleReport {
        locale: other.name.clone(),
        missing: ref_keys
            .difference(&other_keys)
            .map(|k| k.to_string())
            .collect(),
        extra: other_keys
            .difference(&ref_keys)
            .map(|k| k.to_string())
            .collect(),
    }
}

/// Load every .json locale in a directory and report each against the
/// reference. The reference must be one of the files found.
pub fn check_directory(dir: &Path, reference_name: &str) -> AppResult<Vec<LocaleReport>> {
    let mut locales = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            locales.push(Locale::load(&path)?);
        }
    }

    let reference = locales
        .iter()
        .find(|l| l.name == reference_name)
        .cloned()
        .ok_or_else(|| {
            AppError::Validation(format!("Reference locale '{}' not found", reference_name))
        })?;

    let mut reports: Vec<LocaleReport> = locales
        .iter()
        .filter(|l| l.name != reference.name)
        .map(|l| compare_locales(&reference, l))
        .collect();
    reports.sort_by(|a, b| a.locale.cmp(&b.locale));
    Ok(reports)
}

//! Metadata resolution.
//!
//! Merges configuration-level defaults with the per-script overrides pulled
//! out of the `defineUserScript` object literal, then renders the computed
//! location fields against the `{scriptName, version}` context. Computed
//! fields are declared as template strings in the defaults and evaluated
//! lazily, once the merged record has settled on a version.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::MetaError;

lazy_static! {
    /// `{placeholder}` occurrences inside computed-field templates.
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{([A-Za-z][A-Za-z0-9]*)\}").unwrap();
}

/// A resolved metadata value: one string, or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Scalar(String),
    List(Vec<String>),
}

/// Default metadata from the configuration file. Keys use the same camelCase
/// spelling as the per-script overrides, so a block can move between the
/// config file and a script without edits.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetaDefaults {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "match", default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    pub run_at: Option<String>,
    #[serde(default)]
    pub grant: Vec<String>,
    /// Template over `{scriptName}` and `{version}`.
    #[serde(rename = "updateURL")]
    pub update_url: Option<String>,
    /// Template over `{scriptName}` and `{version}`.
    #[serde(rename = "downloadURL")]
    pub download_url: Option<String>,
}

/// The final per-entry metadata record. Absent fields stay `None`/empty and
/// are omitted from the header entirely. Built once per entry per build run,
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaRecord {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub matches: Vec<String>,
    pub includes: Vec<String>,
    pub run_at: Option<String>,
    pub grants: Vec<String>,
    pub update_url: Option<String>,
    pub download_url: Option<String>,
    /// Unrecognized extension fields, in override-record order.
    pub extra: Vec<(String, MetaValue)>,
}

fn scalar(field: &str, value: &MetaValue) -> Result<String, MetaError> {
    match value {
        MetaValue::Scalar(s) => Ok(s.clone()),
        MetaValue::List(_) => Err(MetaError::Field {
            field: field.to_string(),
            reason: "expected a single value, found a list".to_string(),
        }),
    }
}

fn list(value: &MetaValue) -> Vec<String> {
    match value {
        MetaValue::Scalar(s) => vec![s.clone()],
        MetaValue::List(items) => items.clone(),
    }
}

/// Render a computed-field template against the resolve context. Unknown
/// placeholders fail, tagging the offending field.
fn render_template(
    field: &str,
    template: &str,
    script_name: &str,
    version: Option<&str>,
) -> Result<String, MetaError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        out.push_str(&template[last..whole.start()]);
        match &caps[1] {
            "scriptName" => out.push_str(script_name),
            "version" => match version {
                Some(v) => out.push_str(v),
                None => {
                    return Err(MetaError::Field {
                        field: field.to_string(),
                        reason: "template references {version} but no version is declared"
                            .to_string(),
                    });
                }
            },
            other => {
                return Err(MetaError::Field {
                    field: field.to_string(),
                    reason: format!("unknown placeholder {{{other}}}"),
                });
            }
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Merge defaults and overrides into a final record.
///
/// Overrides win field-by-field, one level deep: a list override replaces the
/// default list wholesale. Computed location fields are rendered last, once
/// the merged version is known. A failure aborts this entry's build only.
pub fn resolve(
    defaults: &MetaDefaults,
    overrides: &[(String, MetaValue)],
    script_name: &str,
) -> Result<MetaRecord, MetaError> {
    let mut record = MetaRecord {
        name: defaults.name.clone(),
        version: defaults.version.clone(),
        description: defaults.description.clone(),
        icon: defaults.icon.clone(),
        matches: defaults.matches.clone(),
        includes: defaults.include.clone(),
        run_at: defaults.run_at.clone(),
        grants: defaults.grant.clone(),
        update_url: defaults.update_url.clone(),
        download_url: defaults.download_url.clone(),
        extra: Vec::new(),
    };

    for (key, value) in overrides {
        match key.as_str() {
            "name" => record.name = Some(scalar(key, value)?),
            "version" => record.version = Some(scalar(key, value)?),
            "description" => record.description = Some(scalar(key, value)?),
            "icon" => record.icon = Some(scalar(key, value)?),
            "match" => record.matches = list(value),
            "include" => record.includes = list(value),
            "runAt" | "run-at" => record.run_at = Some(scalar(key, value)?),
            "grant" => record.grants = list(value),
            "updateURL" => record.update_url = Some(scalar(key, value)?),
            "downloadURL" => record.download_url = Some(scalar(key, value)?),
            _ => {
                // Extension field: last write for a key wins, first position kept.
                let value = value.clone();
                match record.extra.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = value,
                    None => record.extra.push((key.clone(), value)),
                }
            }
        }
    }

    let version = record.version.clone();
    if let Some(template) = record.update_url.take() {
        record.update_url = Some(render_template(
            "updateURL",
            &template,
            script_name,
            version.as_deref(),
        )?);
    }
    if let Some(template) = record.download_url.take() {
        record.download_url = Some(render_template(
            "downloadURL",
            &template,
            script_name,
            version.as_deref(),
        )?);
    }

    Ok(record)
}

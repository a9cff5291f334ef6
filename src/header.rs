//! Header synthesis.
//!
//! Serializes a resolved metadata record into the `==UserScript==` block a
//! userscript manager reads. Pure: the same record always produces
//! byte-identical text.

use crate::error::HeaderError;
use crate::meta::{MetaRecord, MetaValue};

pub const HEADER_START: &str = "// ==UserScript==";
pub const HEADER_END: &str = "// ==/UserScript==";

/// Column the value starts at, measured from the `@`. Matches the layout
/// userscript managers conventionally display.
const FIELD_COLUMN: usize = 13;

fn header_line(field: &str, value: &str) -> Result<String, HeaderError> {
    if value.contains('\n') || value.contains('\r') {
        return Err(HeaderError::MultilineValue(field.to_string()));
    }
    if field.len() < FIELD_COLUMN {
        Ok(format!("// @{:<width$}{}", field, value, width = FIELD_COLUMN))
    } else {
        Ok(format!("// @{field} {value}"))
    }
}

fn push_scalar(
    lines: &mut Vec<String>,
    field: &str,
    value: &Option<String>,
) -> Result<(), HeaderError> {
    if let Some(value) = value {
        lines.push(header_line(field, value)?);
    }
    Ok(())
}

fn push_list(lines: &mut Vec<String>, field: &str, values: &[String]) -> Result<(), HeaderError> {
    for value in values {
        lines.push(header_line(field, value)?);
    }
    Ok(())
}

/// Render the header block. Canonical fields come first in fixed order,
/// extension fields follow in record order, one line per list element.
pub fn synthesize(record: &MetaRecord) -> Result<String, HeaderError> {
    let mut lines = vec![HEADER_START.to_string()];

    push_scalar(&mut lines, "name", &record.name)?;
    push_scalar(&mut lines, "version", &record.version)?;
    push_scalar(&mut lines, "description", &record.description)?;
    push_scalar(&mut lines, "icon", &record.icon)?;
    push_list(&mut lines, "match", &record.matches)?;
    push_list(&mut lines, "include", &record.includes)?;
    push_scalar(&mut lines, "run-at", &record.run_at)?;
    push_list(&mut lines, "grant", &record.grants)?;
    push_scalar(&mut lines, "updateURL", &record.update_url)?;
    push_scalar(&mut lines, "downloadURL", &record.download_url)?;

    for (field, value) in &record.extra {
        match value {
            MetaValue::Scalar(s) => lines.push(header_line(field, s)?),
            MetaValue::List(items) => push_list(&mut lines, field, items)?,
        }
    }

    lines.push(HEADER_END.to_string());
    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn renders_canonical_order_and_padding() {
        let record = MetaRecord {
            name: Some("Example".to_string()),
            version: Some("1.0.0".to_string()),
            matches: vec!["https://example.com/*".to_string()],
            ..MetaRecord::default()
        };

        let header = synthesize(&record).unwrap();
        assert_eq!(
            header,
            "// ==UserScript==\n\
             // @name         Example\n\
             // @version      1.0.0\n\
             // @match        https://example.com/*\n\
             // ==/UserScript==\n"
        );
    }

    #[test]
    fn list_fields_emit_one_line_per_element() {
        let record = MetaRecord {
            matches: vec![
                "https://a.example/*".to_string(),
                "https://b.example/*".to_string(),
            ],
            grants: vec!["GM_getValue".to_string(), "GM_setValue".to_string()],
            ..MetaRecord::default()
        };

        let header = synthesize(&record).unwrap();
        assert_eq!(
            header,
            "// ==UserScript==\n\
             // @match        https://a.example/*\n\
             // @match        https://b.example/*\n\
             // @grant        GM_getValue\n\
             // @grant        GM_setValue\n\
             // ==/UserScript==\n"
        );
    }

    #[test]
    fn extension_fields_follow_in_record_order() {
        let record = MetaRecord {
            name: Some("Example".to_string()),
            extra: vec![
                (
                    "homepageURL".to_string(),
                    MetaValue::Scalar("https://example.com".to_string()),
                ),
                ("noframes".to_string(), MetaValue::Scalar(String::new())),
            ],
            ..MetaRecord::default()
        };

        let header = synthesize(&record).unwrap();
        let lines: Vec<&str> = header.lines().collect();
        assert_eq!(lines[2], "// @homepageURL  https://example.com");
        assert_eq!(lines[3], "// @noframes     ");
        assert_eq!(lines[4], HEADER_END);
    }

    #[test]
    fn long_field_tags_keep_a_separator_space() {
        let record = MetaRecord {
            extra: vec![(
                "exclude-match-long".to_string(),
                MetaValue::Scalar("https://x.example/*".to_string()),
            )],
            ..MetaRecord::default()
        };

        let header = synthesize(&record).unwrap();
        assert!(header.contains("// @exclude-match-long https://x.example/*"));
    }

    #[test]
    fn multiline_value_fails_validation() {
        let record = MetaRecord {
            description: Some("line one\nline two".to_string()),
            ..MetaRecord::default()
        };

        assert_eq!(
            synthesize(&record).unwrap_err(),
            HeaderError::MultilineValue("description".to_string())
        );
    }

    #[test]
    fn same_record_produces_identical_text() {
        let record = MetaRecord {
            name: Some("Example".to_string()),
            version: Some("1.0.0".to_string()),
            matches: vec!["https://example.com/*".to_string()],
            update_url: Some("https://dl.example/example.user.js".to_string()),
            ..MetaRecord::default()
        };

        assert_eq!(synthesize(&record).unwrap(), synthesize(&record).unwrap());
    }
}

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

use crate::ValidationError;

use super::Record;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern"));

/// Typed, field-named access to one JSON object. `null` counts as absent.
pub(super) struct Fields<'a> {
    record: &'static str,
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(super) fn new(record: &'static str, value: &'a Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(object) => Ok(Self { record, object }),
            other => Err(ValidationError::new(
                record,
                "<root>",
                format!("expected an object, found {}", type_name(other)),
            )),
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|value| !value.is_null())
    }

    fn missing(&self, field: &str) -> ValidationError {
        ValidationError::new(self.record, field, "is required")
    }

    fn invalid(&self, field: &str, expected: &str, found: &Value) -> ValidationError {
        ValidationError::new(
            self.record,
            field,
            format!("expected {expected}, found {}", type_name(found)),
        )
    }

    pub(super) fn string(&self, field: &str) -> Result<String, ValidationError> {
        self.opt_string(field)?.ok_or_else(|| self.missing(field))
    }

    pub(super) fn string_or_default(&self, field: &str) -> Result<String, ValidationError> {
        Ok(self.opt_string(field)?.unwrap_or_default())
    }

    pub(super) fn opt_string(&self, field: &str) -> Result<Option<String>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(self.invalid(field, "a string", other)),
        }
    }

    pub(super) fn float(&self, field: &str) -> Result<f64, ValidationError> {
        self.opt_float(field)?.ok_or_else(|| self.missing(field))
    }

    /// Accepts JSON numbers and numeric strings.
    pub(super) fn opt_float(&self, field: &str) -> Result<Option<f64>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_f64()
                .map(Some)
                .ok_or_else(|| ValidationError::new(self.record, field, "is not a finite number")),
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| {
                    ValidationError::new(self.record, field, format!("`{text}` is not a number"))
                }),
            Some(other) => Err(self.invalid(field, "a number", other)),
        }
    }

    pub(super) fn int(&self, field: &str) -> Result<i64, ValidationError> {
        self.opt_int(field)?.ok_or_else(|| self.missing(field))
    }

    pub(super) fn int_or(&self, field: &str, default: i64) -> Result<i64, ValidationError> {
        Ok(self.opt_int(field)?.unwrap_or(default))
    }

    fn opt_int(&self, field: &str) -> Result<Option<i64>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_i64()
                .map(Some)
                .ok_or_else(|| ValidationError::new(self.record, field, "is not an integer")),
            Some(Value::String(text)) => text
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| {
                    ValidationError::new(self.record, field, format!("`{text}` is not an integer"))
                }),
            Some(other) => Err(self.invalid(field, "an integer", other)),
        }
    }

    pub(super) fn datetime(&self, field: &str) -> Result<NaiveDateTime, ValidationError> {
        self.opt_datetime(field)?.ok_or_else(|| self.missing(field))
    }

    /// RFC 3339 values keep their wall-clock time; the offset is dropped.
    pub(super) fn opt_datetime(
        &self,
        field: &str,
    ) -> Result<Option<NaiveDateTime>, ValidationError> {
        let Some(text) = self.opt_string(field)? else {
            return Ok(None);
        };
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
            return Ok(Some(parsed.naive_local()));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())
            .map(Some)
            .ok_or_else(|| {
                ValidationError::new(self.record, field, format!("`{text}` is not a datetime"))
            })
    }

    pub(super) fn string_list(&self, field: &str) -> Result<Vec<String>, ValidationError> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::String(value) => Ok(value.clone()),
                    other => Err(self.invalid(&format!("{field}[{index}]"), "a string", other)),
                })
                .collect(),
            Some(other) => Err(self.invalid(field, "a list", other)),
        }
    }

    pub(super) fn string_list_map(
        &self,
        field: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, ValidationError> {
        match self.get(field) {
            None => Ok(BTreeMap::new()),
            Some(value @ Value::Object(_)) => {
                let nested = Fields::new(self.record, value)?;
                nested
                    .object
                    .keys()
                    .map(|key| {
                        nested
                            .string_list(key)
                            .map(|values| (key.clone(), values))
                            .map_err(|err| prefixed(self.record, field, err))
                    })
                    .collect()
            }
            Some(other) => Err(self.invalid(field, "an object", other)),
        }
    }

    pub(super) fn records<R: Record>(&self, field: &str) -> Result<Vec<R>, ValidationError> {
        match self.get(field) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    R::from_json(item)
                        .map_err(|err| prefixed(self.record, &format!("{field}[{index}]"), err))
                })
                .collect(),
            Some(other) => Err(self.invalid(field, "a list", other)),
        }
    }
}

fn prefixed(record: &'static str, prefix: &str, inner: ValidationError) -> ValidationError {
    ValidationError::new(record, format!("{prefix}.{}", inner.field), inner.message)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Drops anything shaped like an HTML tag and trims the result.
pub(super) fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numeric_strings_are_accepted() {
        let value = json!({"credits": "7.5", "id": "12"});
        let fields = Fields::new("Test", &value).unwrap();
        assert_eq!(fields.float("credits").unwrap(), 7.5);
        assert_eq!(fields.int("id").unwrap(), 12);
    }

    #[test]
    fn null_reads_as_absent() {
        let value = json!({"guia": null});
        let fields = Fields::new("Test", &value).unwrap();
        assert_eq!(fields.opt_string("guia").unwrap(), None);
        assert_eq!(fields.string("guia").unwrap_err().field, "guia");
    }

    #[test]
    fn wrong_type_names_the_field() {
        let value = json!({"plans": ["GRAU", 3]});
        let fields = Fields::new("Course", &value).unwrap();
        let err = fields.string_list("plans").unwrap_err();
        assert_eq!(err.record, "Course");
        assert_eq!(err.field, "plans[1]");
    }

    #[test]
    fn parses_naive_and_offset_datetimes() {
        let value = json!({
            "naive": "2024-01-10T08:00:00",
            "offset": "2024-01-10T08:00:00+01:00",
            "spaced": "2024-01-10 08:00:00",
        });
        let fields = Fields::new("Test", &value).unwrap();
        let expected = NaiveDateTime::parse_from_str("2024-01-10T08:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap();
        assert_eq!(fields.datetime("naive").unwrap(), expected);
        assert_eq!(fields.datetime("offset").unwrap(), expected);
        assert_eq!(fields.datetime("spaced").unwrap(), expected);
    }

    #[test]
    fn strip_tags_removes_markup() {
        assert_eq!(strip_tags("  <p>Hello <b>world</b></p> "), "Hello world");
        assert_eq!(strip_tags("a <> b < c"), "a <> b < c");
        assert_eq!(strip_tags("a < b > c"), "a  c");
        assert_eq!(strip_tags("line<br/>break"), "linebreak");
    }
}

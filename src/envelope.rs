//! JSON strings handed to a tool-calling agent.
//!
//! Tool functions call the client and pass the result to [`respond`]; this is
//! the only place where typed errors become user-facing messages.

use serde::Serialize;
use serde_json::{Value, json};

use crate::ApiError;

pub const NO_RESULTS: &str = "No results found.";

pub fn respond<T: Serialize>(result: Result<T, ApiError>) -> String {
    match result {
        Ok(value) => format_response(&value, None),
        Err(error) => error_response(&error),
    }
}

/// Lists become `{"count", "results"}` (plus an optional summary); an empty
/// list becomes [`NO_RESULTS`]. Anything else is pretty-printed as-is.
pub fn format_response<T: Serialize>(data: &T, summary: Option<&str>) -> String {
    let value = match serde_json::to_value(data) {
        Ok(value) => value,
        Err(err) => {
            return envelope(
                "Unexpected error",
                &format!("An unexpected error occurred: {err}"),
            );
        }
    };

    let value = match value {
        Value::Array(items) if items.is_empty() => return NO_RESULTS.to_string(),
        Value::Array(items) => {
            let mut wrapped = json!({"count": items.len(), "results": items});
            if let Some(summary) = summary {
                wrapped["summary"] = Value::String(summary.to_string());
            }
            wrapped
        }
        other => other,
    };
    pretty(&value)
}

pub fn error_response(error: &ApiError) -> String {
    match error {
        ApiError::AuthRequired => envelope(
            "Authentication required",
            "You need to log in with your FIB account to access personal data like your courses, schedule, and notices.",
        ),
        ApiError::Authentication { .. } => envelope(
            "Authentication failed",
            "The FIB API credentials are invalid or missing. Please check your configuration.",
        ),
        ApiError::NotFound { .. } => envelope(
            "Not found",
            "The requested resource was not found in the FIB system.",
        ),
        ApiError::RateLimited { .. } => envelope(
            "Rate limit exceeded",
            "Too many requests to the FIB API. Please wait a moment and try again.",
        ),
        other => envelope(
            "API error",
            &format!("An error occurred while accessing the FIB API: {other}"),
        ),
    }
}

fn envelope(error: &str, message: &str) -> String {
    pretty(&json!({"error": error, "message": message}))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Room {
        id: &'static str,
    }

    #[test]
    fn lists_are_counted() {
        let output = respond(Ok(vec![Room { id: "A5001" }, Room { id: "A5002" }]));
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["results"][1]["id"], "A5002");
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(respond(Ok(Vec::<Room>::new())), NO_RESULTS);
    }

    #[test]
    fn summary_is_attached_to_lists() {
        let output = format_response(&vec![Room { id: "A" }], Some("1 room"));
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["summary"], "1 room");
    }

    #[test]
    fn single_values_are_not_wrapped() {
        let output = respond(Ok(Room { id: "A5001" }));
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value, json!({"id": "A5001"}));
    }

    #[test]
    fn errors_map_to_fixed_messages() {
        let cases = [
            (ApiError::AuthRequired, "Authentication required"),
            (ApiError::Authentication { body: String::new() }, "Authentication failed"),
            (ApiError::NotFound { url: "u".to_string() }, "Not found"),
            (ApiError::RateLimited { body: String::new() }, "Rate limit exceeded"),
            (
                ApiError::Status {
                    status: 500,
                    body: "boom".to_string(),
                },
                "API error",
            ),
        ];
        for (error, expected) in cases {
            let value: Value = serde_json::from_str(&respond::<()>(Err(error))).unwrap();
            assert_eq!(value["error"], expected);
        }
    }

    #[test]
    fn generic_errors_keep_diagnostic_detail() {
        let output = error_response(&ApiError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        });
        assert!(output.contains("502"));
        assert!(output.contains("bad gateway"));
    }
}

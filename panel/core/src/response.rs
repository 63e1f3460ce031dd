//! Response Parsing
//!
//! The agent's final content is either plain prose or a single JSON object
//! whose `request_type` selects a structured variant:
//!
//! ```json
//! {"request_type": "final_response", "response": "Done."}
//! {"request_type": "automation_suggestion", "message": "...", "automation": {...}}
//! {"request_type": "dashboard_suggestion", "message": "...", "dashboard": {...}}
//! ```
//!
//! JSON is only attempted when the trimmed content starts with `{` and ends
//! with `}`. Anything that does not parse into one of the variants is shown
//! as-is. Parsing never fails.

use serde::Deserialize;
use serde_json::Value;

/// Structured agent reply, selected by `request_type`
#[derive(Debug, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
enum StructuredReply {
    AutomationSuggestion {
        #[serde(default)]
        message: String,
        automation: Value,
    },
    DashboardSuggestion {
        #[serde(default)]
        message: String,
        dashboard: Value,
    },
    FinalResponse {
        response: String,
    },
}

/// Display-ready form of an agent reply
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedResponse {
    /// Text to show
    pub text: String,
    /// Suggested automation, if the reply carried one
    pub automation: Option<Value>,
    /// Suggested dashboard, if the reply carried one
    pub dashboard: Option<Value>,
}

impl ParsedResponse {
    fn prose(content: &str) -> Self {
        Self {
            text: content.to_string(),
            ..Self::default()
        }
    }
}

/// Parse raw agent content into display text and structured payloads
#[must_use]
pub fn parse_response(content: &str) -> ParsedResponse {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return ParsedResponse::prose(content);
    }

    match serde_json::from_str::<StructuredReply>(trimmed) {
        Ok(StructuredReply::FinalResponse { response }) => ParsedResponse {
            text: response,
            ..ParsedResponse::default()
        },
        Ok(StructuredReply::AutomationSuggestion {
            message,
            automation,
        }) => ParsedResponse {
            text: message,
            automation: Some(automation),
            dashboard: None,
        },
        Ok(StructuredReply::DashboardSuggestion { message, dashboard }) => ParsedResponse {
            text: message,
            automation: None,
            dashboard: Some(dashboard),
        },
        Err(e) => {
            tracing::debug!(error = %e, "Reply looked like JSON but did not parse, showing as text");
            ParsedResponse::prose(content)
        }
    }
}

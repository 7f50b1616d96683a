//! Tool declarations, argument decoding, and executors.
//!
//! Arguments decode into [`ToolInvocation`], a tagged union keyed by tool
//! name. Decoding failures never leave this module as plain errors the
//! caller must branch on; the accumulator absorbs them.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use easel_core::{Error, ImageSearch, Result, ToolDefinition};

/// Name of the image lookup tool exposed to the model.
pub const GET_IMAGE_SRC: &str = "getImageSrc";

/// Function-calling declaration for [`GET_IMAGE_SRC`].
pub fn image_tool_definition() -> ToolDefinition {
    ToolDefinition::function(
        GET_IMAGE_SRC,
        "Find an image on the web matching a description, returning its URL.",
        json!({
            "type": "object",
            "properties": {
                "altText": {
                    "type": "string",
                    "description": "Short description of the image to find"
                }
            },
            "required": ["altText"]
        }),
    )
}

/// Why an accumulated tool call was rejected. Absorbed locally, never
/// surfaced to clients.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ToolValidationError {
    #[error("missing tool name")]
    MissingName,
    #[error("arguments too short to be an object")]
    ArgsTooShort,
    #[error("arguments are not a JSON object")]
    NotAnObject,
    #[error("arguments are not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// A fully decoded tool call, one variant per tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    /// Image URL lookup by description.
    ImageLookup { alt_text: String },
}

impl ToolInvocation {
    /// Decode an accumulated call. The argument buffer is raw streamed
    /// text, so structural checks run before the JSON parse.
    pub(crate) fn parse(name: &str, args: &str) -> std::result::Result<Self, ToolValidationError> {
        if name.is_empty() {
            return Err(ToolValidationError::MissingName);
        }

        let args = args.trim();
        if args.len() < 3 {
            return Err(ToolValidationError::ArgsTooShort);
        }
        if !args.starts_with('{') || !args.ends_with('}') {
            return Err(ToolValidationError::NotAnObject);
        }

        let value: JsonValue = serde_json::from_str(args)
            .map_err(|e| ToolValidationError::InvalidJson(e.to_string()))?;
        let obj = value
            .as_object()
            .ok_or(ToolValidationError::NotAnObject)?;

        match name {
            GET_IMAGE_SRC => {
                let alt_text = obj
                    .get("altText")
                    .and_then(|v| v.as_str())
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(ToolValidationError::MissingField("altText"))?;
                Ok(ToolInvocation::ImageLookup {
                    alt_text: alt_text.to_string(),
                })
            }
            other => Err(ToolValidationError::UnknownTool(other.to_string())),
        }
    }
}

// =============================================================================
// GOOGLE IMAGE SEARCH
// =============================================================================

const CUSTOMSEARCH_URL: &str = "https://customsearch.googleapis.com/customsearch/v1";

/// Image search over the Google Custom Search JSON API.
pub struct GoogleImageSearch {
    client: reqwest::Client,
    api_key: String,
    engine_id: String,
}

impl GoogleImageSearch {
    pub fn new(api_key: String, engine_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            engine_id,
        }
    }

    /// Build from `GOOGLE_SEARCH_API_KEY` / `GOOGLE_SEARCH_ENGINE_ID`.
    /// Returns None when either is unset; the tool is then not offered to
    /// the model at all.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GOOGLE_SEARCH_API_KEY").ok()?;
        let engine_id = std::env::var("GOOGLE_SEARCH_ENGINE_ID").ok()?;
        Some(Self::new(api_key, engine_id))
    }
}

#[async_trait]
impl ImageSearch for GoogleImageSearch {
    async fn search(&self, alt_text: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(CUSTOMSEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", alt_text),
                ("searchType", "image"),
                ("num", "1"),
            ])
            .send()
            .await
            .map_err(|e| Error::Request(format!("Image search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "Image search returned {}",
                response.status()
            )));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Image search response: {}", e)))?;

        let url = body
            .get("items")
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("link"))
            .and_then(|link| link.as_str())
            .map(str::to_string);

        debug!(
            subsystem = "assist",
            component = "image_search",
            op = "search",
            found = url.is_some(),
            "Image search completed"
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_image_lookup() {
        let inv = ToolInvocation::parse(GET_IMAGE_SRC, r#"{"altText": "a red barn"}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::ImageLookup {
                alt_text: "a red barn".to_string()
            }
        );
    }

    #[test]
    fn test_parse_trims_alt_text() {
        let inv = ToolInvocation::parse(GET_IMAGE_SRC, r#"{"altText": "  cat  "}"#).unwrap();
        assert_eq!(
            inv,
            ToolInvocation::ImageLookup {
                alt_text: "cat".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(matches!(
            ToolInvocation::parse("", r#"{"altText": "x"}"#),
            Err(ToolValidationError::MissingName)
        ));
    }

    #[test]
    fn test_parse_rejects_short_args() {
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, "{}"),
            Err(ToolValidationError::ArgsTooShort)
        ));
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, ""),
            Err(ToolValidationError::ArgsTooShort)
        ));
    }

    #[test]
    fn test_parse_rejects_non_object_shape() {
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, "[1, 2]"),
            Err(ToolValidationError::NotAnObject)
        ));
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, "{\"altText\": \"x\""),
            Err(ToolValidationError::NotAnObject)
        ));
    }

    #[test]
    fn test_parse_rejects_truncated_json() {
        // Braces balance but the middle is cut: shape check passes, parse fails.
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, "{\"altText\": \"x}"),
            Err(ToolValidationError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_rejects_blank_alt_text() {
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, r#"{"altText": "   "}"#),
            Err(ToolValidationError::MissingField("altText"))
        ));
        assert!(matches!(
            ToolInvocation::parse(GET_IMAGE_SRC, r#"{"other": "x"}"#),
            Err(ToolValidationError::MissingField("altText"))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_tool() {
        assert!(matches!(
            ToolInvocation::parse("danceMonkey", r#"{"altText": "x"}"#),
            Err(ToolValidationError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_tool_definition_requires_alt_text() {
        let def = image_tool_definition();
        let wire = serde_json::to_value(&def).unwrap();
        assert_eq!(wire["function"]["name"], GET_IMAGE_SRC);
        assert_eq!(wire["function"]["parameters"]["required"][0], "altText");
    }
}

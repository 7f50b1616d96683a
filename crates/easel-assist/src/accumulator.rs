//! Reassembles streamed tool-call fragments into complete calls.
//!
//! Providers split a tool call across many deltas: the first usually
//! carries the call id and function name, the rest carry argument text a
//! few characters at a time. The accumulator concatenates argument text
//! verbatim and validates the finished call in one place, so malformed
//! output from the model degrades to "no tool call" instead of an error.

use tracing::debug;

use easel_core::ToolCallFragment;

use crate::tools::ToolInvocation;

#[derive(Debug, Default)]
enum AccumulatorState {
    #[default]
    Idle,
    Accumulating {
        id: String,
        name: String,
        args: String,
    },
}

/// A validated, ready-to-execute tool call.
#[derive(Debug, Clone)]
pub struct PreparedToolCall {
    pub id: String,
    pub name: String,
    /// Raw argument text exactly as streamed, for the transcript echo.
    pub arguments: String,
    pub invocation: ToolInvocation,
}

/// Single-call accumulator. Parallel tool calls are not supported; a
/// fragment with a new id discards whatever was in progress.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    state: AccumulatorState,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, AccumulatorState::Accumulating { .. })
    }

    /// Fold one fragment into the current call. Fragments without an id
    /// belong to the call in progress; a different non-empty id starts
    /// over from the new fragment.
    pub fn push(&mut self, fragment: &ToolCallFragment) {
        match &mut self.state {
            AccumulatorState::Idle => {
                self.state = AccumulatorState::Accumulating {
                    id: fragment.id.clone().unwrap_or_default(),
                    name: fragment.name.clone().unwrap_or_default(),
                    args: fragment.arguments.clone().unwrap_or_default(),
                };
            }
            AccumulatorState::Accumulating { id, name, args } => {
                if let Some(new_id) = fragment.id.as_deref() {
                    if !new_id.is_empty() && new_id != id {
                        debug!(
                            subsystem = "assist",
                            component = "accumulator",
                            op = "push",
                            previous_id = %id,
                            new_id = %new_id,
                            "Discarding in-progress tool call for new id"
                        );
                        self.state = AccumulatorState::Accumulating {
                            id: new_id.to_string(),
                            name: fragment.name.clone().unwrap_or_default(),
                            args: fragment.arguments.clone().unwrap_or_default(),
                        };
                        return;
                    }
                }
                // The name arrives once; later fragments never overwrite it.
                if name.is_empty() {
                    if let Some(new_name) = fragment.name.as_deref() {
                        name.push_str(new_name);
                    }
                }
                if let Some(new_args) = fragment.arguments.as_deref() {
                    args.push_str(new_args);
                }
            }
        }
    }

    /// Validate and take the accumulated call, resetting to idle. Returns
    /// None when nothing was accumulated or the call fails validation;
    /// rejections are logged here and otherwise invisible.
    pub fn finish(&mut self) -> Option<PreparedToolCall> {
        let state = std::mem::take(&mut self.state);
        let (id, name, args) = match state {
            AccumulatorState::Idle => return None,
            AccumulatorState::Accumulating { id, name, args } => (id, name, args),
        };

        match ToolInvocation::parse(&name, &args) {
            Ok(invocation) => Some(PreparedToolCall {
                id,
                name,
                arguments: args.trim().to_string(),
                invocation,
            }),
            Err(err) => {
                debug!(
                    subsystem = "assist",
                    component = "accumulator",
                    op = "finish",
                    tool_name = %name,
                    error = %err,
                    "Dropping invalid tool call"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::GET_IMAGE_SRC;

    fn fragment(id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallFragment {
        ToolCallFragment {
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: args.map(str::to_string),
        }
    }

    #[test]
    fn test_accumulates_fragmented_arguments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), Some("")));
        acc.push(&fragment(None, None, Some("{\"alt")));
        acc.push(&fragment(None, None, Some("Text\": \"a red")));
        acc.push(&fragment(None, None, Some(" barn\"}")));

        let call = acc.finish().unwrap();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, GET_IMAGE_SRC);
        assert_eq!(call.arguments, "{\"altText\": \"a red barn\"}");
        assert_eq!(
            call.invocation,
            ToolInvocation::ImageLookup {
                alt_text: "a red barn".to_string()
            }
        );
        assert!(!acc.is_accumulating());
    }

    #[test]
    fn test_name_never_overwritten() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), None));
        acc.push(&fragment(None, Some("somethingElse"), Some("{\"altText\":\"x\"}")));

        let call = acc.finish().unwrap();
        assert_eq!(call.name, GET_IMAGE_SRC);
    }

    #[test]
    fn test_same_id_fragments_continue_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), Some("{\"altText\":")));
        acc.push(&fragment(Some("call_1"), None, Some("\"dog\"}")));

        let call = acc.finish().unwrap();
        assert_eq!(call.arguments, "{\"altText\":\"dog\"}");
    }

    #[test]
    fn test_new_id_discards_in_progress_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), Some("{\"altText\":\"a")));
        acc.push(&fragment(
            Some("call_2"),
            Some(GET_IMAGE_SRC),
            Some("{\"altText\":\"b\"}"),
        ));

        let call = acc.finish().unwrap();
        assert_eq!(call.id, "call_2");
        assert_eq!(call.invocation, ToolInvocation::ImageLookup {
            alt_text: "b".to_string()
        });
    }

    #[test]
    fn test_finish_idle_returns_none() {
        let mut acc = ToolCallAccumulator::new();
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_finish_absorbs_invalid_call() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), Some("{\"altText\":")));
        assert!(acc.finish().is_none());
        assert!(!acc.is_accumulating());
    }

    #[test]
    fn test_finish_absorbs_missing_name() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), None, Some("{\"altText\":\"x\"}")));
        assert!(acc.finish().is_none());
    }

    #[test]
    fn test_finish_resets_state() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&fragment(Some("call_1"), Some(GET_IMAGE_SRC), Some("{\"altText\":\"x\"}")));
        assert!(acc.finish().is_some());
        assert!(acc.finish().is_none());
    }
}

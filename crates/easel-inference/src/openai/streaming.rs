//! SSE stream parsing for OpenAI-compatible streaming chat responses.
//!
//! Network chunks can split an SSE line anywhere, so a carry-over buffer
//! reassembles complete lines before parsing. Each `data:` line becomes
//! zero or more [`TurnDelta`]s.

use futures::{Stream, StreamExt};

use easel_core::{Error, FinishReason, Result, ToolCallFragment, TurnDelta, TurnStream};

use super::types::ChatCompletionChunk;

/// Line-reassembly buffer over raw SSE bytes.
#[derive(Default)]
struct SseLineBuffer {
    pending: String,
    done: bool,
}

impl SseLineBuffer {
    /// Feed one network chunk, returning the deltas from every complete line.
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<TurnDelta>> {
        if self.done {
            return Vec::new();
        }
        self.pending.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if line == "data: [DONE]" {
                self.done = true;
                break;
            }
            if let Some(data) = line.strip_prefix("data: ") {
                match parse_data_line(data) {
                    Ok(deltas) => out.extend(deltas.into_iter().map(Ok)),
                    Err(e) => out.push(Err(e)),
                }
            }
        }
        out
    }
}

/// Parse one `data:` payload into turn deltas.
fn parse_data_line(data: &str) -> Result<Vec<TurnDelta>> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| Error::Inference(format!("Failed to parse SSE chunk: {}", e)))?;

    let mut deltas = Vec::new();
    for choice in chunk.choices {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                deltas.push(TurnDelta::Content(content));
            }
        }
        if let Some(tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments),
                    None => (None, None),
                };
                deltas.push(TurnDelta::ToolCall(ToolCallFragment {
                    id: tc.id,
                    name,
                    arguments,
                }));
            }
        }
        if let Some(reason) = choice.finish_reason {
            deltas.push(TurnDelta::Finish(FinishReason::from_wire(&reason)));
        }
    }
    Ok(deltas)
}

/// Parse an SSE byte stream into a stream of turn deltas.
pub fn parse_turn_stream(
    stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> TurnStream {
    let deltas = stream
        .scan(SseLineBuffer::default(), |buf, chunk_result| {
            let out = match chunk_result {
                Ok(bytes) => buf.push(&bytes),
                Err(e) => vec![Err(Error::Inference(format!("Stream error: {}", e)))],
            };
            futures::future::ready(Some(futures::stream::iter(out)))
        })
        .flatten();

    Box::pin(deltas)
}

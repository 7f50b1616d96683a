//! Multi-round streaming turn loop with tool execution.
//!
//! One call to [`StreamOrchestrator::run`] drives a whole assistant
//! answer: stream a turn, forward visible content as it arrives, and when
//! the model finishes with a tool call, execute the tool, append the
//! exchange to the transcript, and open the next turn. Rounds are capped
//! so a model that keeps calling tools cannot loop forever.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use easel_core::defaults::{MAX_TOOL_ROUNDS, TURN_TIMEOUT_SECS};
use easel_core::{
    ChatMessage, ContextEntry, Error, FinishReason, ImageSearch, ToolCallPayload,
    ToolFunctionPayload, TurnDelta, TurnProvider,
};

use crate::accumulator::{PreparedToolCall, ToolCallAccumulator};
use crate::tools::{image_tool_definition, ToolInvocation};

/// One event on the client-facing stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "data")]
pub enum AssistantEvent {
    /// Retrieved context entries, sent once before the first turn.
    Context(Vec<ContextEntry>),
    /// A piece of visible answer text.
    Content(String),
    /// Progress note while a tool runs.
    Thinking { message: String },
    /// Fatal condition; the stream ends after this (plus Done).
    Error(String),
    /// End of the answer, always the last event.
    Done,
}

impl AssistantEvent {
    /// SSE event name for this variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            AssistantEvent::Context(_) => "context",
            AssistantEvent::Content(_) => "content",
            AssistantEvent::Thinking { .. } => "thinking",
            AssistantEvent::Error(_) => "error",
            AssistantEvent::Done => "done",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Soft cap on model turns per answer. Reaching it ends the answer
    /// normally rather than erroring.
    pub max_rounds: usize,
    /// Wall-clock limit on each stream read.
    pub turn_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: MAX_TOOL_ROUNDS,
            turn_timeout: Duration::from_secs(TURN_TIMEOUT_SECS),
        }
    }
}

/// Drives the turn loop for one assistant answer.
pub struct StreamOrchestrator {
    provider: Arc<dyn TurnProvider>,
    image_search: Option<Arc<dyn ImageSearch>>,
    config: OrchestratorConfig,
}

impl StreamOrchestrator {
    pub fn new(provider: Arc<dyn TurnProvider>, image_search: Option<Arc<dyn ImageSearch>>) -> Self {
        Self {
            provider,
            image_search,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the loop until a terminal finish, the round cap, an error, or
    /// client disconnect (receiver dropped). Always attempts a final
    /// `Done` event.
    pub async fn run(&self, mut messages: Vec<ChatMessage>, tx: mpsc::Sender<AssistantEvent>) {
        let tools = self.image_search.as_ref().map(|_| vec![image_tool_definition()]);

        'rounds: for round in 1..=self.config.max_rounds {
            debug!(
                subsystem = "assist",
                component = "orchestrator",
                op = "open_turn",
                round = round,
                model = self.provider.model_name(),
                "Opening turn"
            );

            let mut stream = match self.provider.open_turn(&messages, tools.as_deref()).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(
                        subsystem = "assist",
                        component = "orchestrator",
                        op = "open_turn",
                        round = round,
                        error = %e,
                        "Failed to open turn"
                    );
                    let _ = tx.send(AssistantEvent::Error(e.to_string())).await;
                    break 'rounds;
                }
            };

            let mut accumulator = ToolCallAccumulator::new();
            let mut finish: Option<FinishReason> = None;

            loop {
                let delta = match tokio::time::timeout(self.config.turn_timeout, stream.next()).await
                {
                    Ok(delta) => delta,
                    Err(_) => {
                        let err = Error::TurnTimeout(self.config.turn_timeout.as_secs());
                        warn!(
                            subsystem = "assist",
                            component = "orchestrator",
                            op = "read_delta",
                            round = round,
                            error = %err,
                            "Turn stream stalled"
                        );
                        let _ = tx.send(AssistantEvent::Error(err.to_string())).await;
                        break 'rounds;
                    }
                };

                match delta {
                    None => break,
                    Some(Ok(TurnDelta::Content(text))) => {
                        if tx.send(AssistantEvent::Content(text)).await.is_err() {
                            debug!(
                                subsystem = "assist",
                                component = "orchestrator",
                                op = "send_event",
                                round = round,
                                "Client disconnected"
                            );
                            break 'rounds;
                        }
                    }
                    Some(Ok(TurnDelta::ToolCall(fragment))) => {
                        accumulator.push(&fragment);
                    }
                    Some(Ok(TurnDelta::Finish(reason))) => {
                        finish = Some(reason);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(
                            subsystem = "assist",
                            component = "orchestrator",
                            op = "read_delta",
                            round = round,
                            error = %e,
                            "Turn stream error"
                        );
                        let _ = tx.send(AssistantEvent::Error(e.to_string())).await;
                        break 'rounds;
                    }
                }
            }

            // A stream that ends mid-accumulation without an explicit
            // finish is treated like a tool-calls finish; the validator in
            // finish() decides whether the call is usable.
            let wants_tool = matches!(finish, Some(FinishReason::ToolCalls))
                || (finish.is_none() && accumulator.is_accumulating());

            if !wants_tool {
                break 'rounds;
            }

            match accumulator.finish() {
                Some(call) => {
                    if tx
                        .send(AssistantEvent::Thinking {
                            message: format!("Running {}...", call.name),
                        })
                        .await
                        .is_err()
                    {
                        break 'rounds;
                    }

                    let result = self.execute(&call).await;
                    info!(
                        subsystem = "assist",
                        component = "orchestrator",
                        op = "execute_tool",
                        round = round,
                        tool_name = %call.name,
                        "Tool executed"
                    );

                    messages.push(ChatMessage::assistant_tool_calls(vec![ToolCallPayload {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: ToolFunctionPayload {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    }]));
                    messages.push(ChatMessage::tool_result(call.id, result));
                }
                // Malformed call: nothing to feed back, end the answer.
                None => break 'rounds,
            }
        }

        let _ = tx.send(AssistantEvent::Done).await;
    }

    async fn execute(&self, call: &PreparedToolCall) -> String {
        match &call.invocation {
            ToolInvocation::ImageLookup { alt_text } => match &self.image_search {
                Some(search) => match search.search(alt_text).await {
                    Ok(Some(url)) => url,
                    Ok(None) => "No image found.".to_string(),
                    Err(e) => {
                        warn!(
                            subsystem = "assist",
                            component = "orchestrator",
                            op = "execute_tool",
                            tool_name = %call.name,
                            error = %e,
                            "Tool execution failed"
                        );
                        format!("Image search failed: {}", e)
                    }
                },
                None => "Image search is not configured.".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use easel_core::{Result, ToolCallFragment};
    use easel_inference::MockTurnProvider;
    use std::sync::Mutex;

    struct StubImageSearch {
        url: Option<String>,
        queries: Mutex<Vec<String>>,
    }

    impl StubImageSearch {
        fn found(url: &str) -> Self {
            Self {
                url: Some(url.to_string()),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn empty() -> Self {
            Self {
                url: None,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageSearch for StubImageSearch {
        async fn search(&self, alt_text: &str) -> Result<Option<String>> {
            self.queries.lock().unwrap().push(alt_text.to_string());
            Ok(self.url.clone())
        }
    }

    fn tool_turn(id: &str, alt_text: &str) -> Vec<Result<TurnDelta>> {
        vec![
            Ok(TurnDelta::ToolCall(ToolCallFragment {
                id: Some(id.to_string()),
                name: Some(crate::tools::GET_IMAGE_SRC.to_string()),
                arguments: Some(format!("{{\"altText\": \"{}\"}}", alt_text)),
            })),
            Ok(TurnDelta::Finish(FinishReason::ToolCalls)),
        ]
    }

    fn content_turn(text: &str) -> Vec<Result<TurnDelta>> {
        vec![
            Ok(TurnDelta::Content(text.to_string())),
            Ok(TurnDelta::Finish(FinishReason::Stop)),
        ]
    }

    async fn collect(mut rx: mpsc::Receiver<AssistantEvent>) -> Vec<AssistantEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_plain_answer_streams_content_then_done() {
        let provider = Arc::new(MockTurnProvider::new().with_turn(vec![
            Ok(TurnDelta::Content("Hello".to_string())),
            Ok(TurnDelta::Content(" there".to_string())),
            Ok(TurnDelta::Finish(FinishReason::Stop)),
        ]));
        let orchestrator = StreamOrchestrator::new(provider, None);

        let (tx, rx) = mpsc::channel(16);
        let messages = vec![ChatMessage::user("hi")];
        orchestrator.run(messages, tx).await;

        let events = collect(rx).await;
        assert!(matches!(&events[0], AssistantEvent::Content(t) if t == "Hello"));
        assert!(matches!(&events[1], AssistantEvent::Content(t) if t == " there"));
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_tool_round_extends_transcript_and_continues() {
        let provider = Arc::new(
            MockTurnProvider::new()
                .with_turn(tool_turn("call_1", "a red barn"))
                .with_turn(content_turn("Here is your barn.")),
        );
        let search = Arc::new(StubImageSearch::found("https://img.example/barn.png"));
        let orchestrator = StreamOrchestrator::new(provider.clone(), Some(search.clone()));

        let (tx, rx) = mpsc::channel(16);
        orchestrator.run(vec![ChatMessage::user("show me a barn")], tx).await;

        let events = collect(rx).await;
        assert!(matches!(&events[0], AssistantEvent::Thinking { .. }));
        assert!(matches!(&events[1], AssistantEvent::Content(t) if t == "Here is your barn."));
        assert!(matches!(&events[2], AssistantEvent::Done));

        assert_eq!(search.queries.lock().unwrap().as_slice(), ["a red barn"]);

        // Second turn sees the original message plus the tool exchange.
        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 1);
        assert_eq!(calls[1].len(), 3);
        assert_eq!(calls[1][1].role, "assistant");
        assert_eq!(
            calls[1][1].tool_calls.as_ref().unwrap()[0].function.arguments,
            "{\"altText\": \"a red barn\"}"
        );
        assert_eq!(calls[1][2].role, "tool");
        assert_eq!(
            calls[1][2].content.as_deref(),
            Some("https://img.example/barn.png")
        );
    }

    #[tokio::test]
    async fn test_empty_search_reports_no_image() {
        let provider = Arc::new(
            MockTurnProvider::new()
                .with_turn(tool_turn("call_1", "unicorn"))
                .with_turn(content_turn("Sorry.")),
        );
        let search = Arc::new(StubImageSearch::empty());
        let orchestrator = StreamOrchestrator::new(provider.clone(), Some(search));

        let (tx, rx) = mpsc::channel(16);
        orchestrator.run(vec![ChatMessage::user("unicorn pls")], tx).await;
        collect(rx).await;

        let calls = provider.calls();
        assert_eq!(calls[1][2].content.as_deref(), Some("No image found."));
    }

    #[tokio::test]
    async fn test_round_cap_ends_answer() {
        let provider = Arc::new(MockTurnProvider::new());
        for i in 0..10 {
            provider.push_turn(tool_turn(&format!("call_{}", i), "more"));
        }
        let search = Arc::new(StubImageSearch::found("https://img.example/x.png"));
        let orchestrator = StreamOrchestrator::new(provider.clone(), Some(search))
            .with_config(OrchestratorConfig {
                max_rounds: 3,
                turn_timeout: Duration::from_secs(5),
            });

        let (tx, rx) = mpsc::channel(64);
        orchestrator.run(vec![ChatMessage::user("loop")], tx).await;

        let events = collect(rx).await;
        assert_eq!(provider.calls().len(), 3);
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));
        assert!(!events
            .iter()
            .any(|e| matches!(e, AssistantEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_invalid_tool_call_ends_quietly() {
        let provider = Arc::new(MockTurnProvider::new().with_turn(vec![
            Ok(TurnDelta::ToolCall(ToolCallFragment {
                id: Some("call_1".to_string()),
                name: Some(crate::tools::GET_IMAGE_SRC.to_string()),
                arguments: Some("{\"altText\":".to_string()),
            })),
            Ok(TurnDelta::Finish(FinishReason::ToolCalls)),
        ]));
        let search = Arc::new(StubImageSearch::found("https://img.example/x.png"));
        let orchestrator = StreamOrchestrator::new(provider.clone(), Some(search.clone()));

        let (tx, rx) = mpsc::channel(16);
        orchestrator.run(vec![ChatMessage::user("hi")], tx).await;

        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AssistantEvent::Done));
        assert_eq!(provider.calls().len(), 1);
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_emits_error_event() {
        let provider = Arc::new(MockTurnProvider::new().with_turn(vec![
            Ok(TurnDelta::Content("partial".to_string())),
            Err(Error::Inference("connection reset".to_string())),
        ]));
        let orchestrator = StreamOrchestrator::new(provider, None);

        let (tx, rx) = mpsc::channel(16);
        orchestrator.run(vec![ChatMessage::user("hi")], tx).await;

        let events = collect(rx).await;
        assert!(matches!(&events[0], AssistantEvent::Content(_)));
        assert!(matches!(&events[1], AssistantEvent::Error(_)));
        assert!(matches!(&events[2], AssistantEvent::Done));
    }

    #[tokio::test]
    async fn test_stalled_stream_times_out() {
        struct PendingProvider;

        #[async_trait]
        impl TurnProvider for PendingProvider {
            async fn open_turn(
                &self,
                _messages: &[ChatMessage],
                _tools: Option<&[easel_core::ToolDefinition]>,
            ) -> Result<easel_core::TurnStream> {
                Ok(Box::pin(futures::stream::pending()))
            }

            fn model_name(&self) -> &str {
                "pending"
            }
        }

        let orchestrator = StreamOrchestrator::new(Arc::new(PendingProvider), None)
            .with_config(OrchestratorConfig {
                max_rounds: 3,
                turn_timeout: Duration::from_millis(20),
            });

        let (tx, rx) = mpsc::channel(16);
        orchestrator.run(vec![ChatMessage::user("hi")], tx).await;

        let events = collect(rx).await;
        assert!(matches!(&events[0], AssistantEvent::Error(msg) if msg.contains("timed out")));
        assert!(matches!(&events[1], AssistantEvent::Done));
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_loop() {
        let provider = Arc::new(
            MockTurnProvider::new()
                .with_turn(content_turn("one"))
                .with_turn(content_turn("two")),
        );
        let orchestrator = StreamOrchestrator::new(provider.clone(), None);

        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        orchestrator.run(vec![ChatMessage::user("hi")], tx).await;

        assert_eq!(provider.calls().len(), 1);
    }

    #[test]
    fn test_event_types() {
        assert_eq!(AssistantEvent::Done.event_type(), "done");
        assert_eq!(AssistantEvent::Content(String::new()).event_type(), "content");
        assert_eq!(AssistantEvent::Context(vec![]).event_type(), "context");
    }
}

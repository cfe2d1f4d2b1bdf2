//! Conversation state and the caller-side chat session
//!
//! The loop works on a [`ConversationState`] seeded from the caller's history;
//! the caller (a [`ChatSession`], the CLI, the HTTP API) owns the longer-lived
//! history and appends whatever the loop generated.

use crate::agent::Orchestrator;
use crate::error::OrchestrationError;
use crate::models::Turn;
use crate::Result;
use std::sync::Arc;
use tracing::debug;

/// Append-only turn sequence for one invocation.
#[derive(Debug, Clone)]
pub struct ConversationState {
    turns: Vec<Turn>,
    seeded: usize,
}

impl ConversationState {
    pub fn seed(history: &[Turn]) -> Self {
        Self {
            turns: history.to_vec(),
            seeded: history.len(),
        }
    }

    /// Full sequence: seeded history followed by appended turns.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Turns appended since seeding.
    pub fn appended(&self) -> &[Turn] {
        &self.turns[self.seeded..]
    }

    pub fn into_appended(mut self) -> Vec<Turn> {
        self.turns.split_off(self.seeded)
    }
}

pub const BLANK_QUERY_MESSAGE: &str = "Please enter a valid query.";

/// A running conversation with one user.
pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            history: Vec::new(),
        }
    }

    /// Send one user query and return the final reply.
    ///
    /// Blank queries are rejected without touching the history.
    pub async fn ask(&mut self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(OrchestrationError::InvalidInput(BLANK_QUERY_MESSAGE.to_string()));
        }

        self.history.push(Turn::user(query));
        let generated = self.orchestrator.continue_conversation(&self.history).await;
        debug!(generated = generated.len(), "Appending generated turns to history");

        let reply = generated
            .last()
            .map(|turn| turn.content.clone())
            .unwrap_or_default();
        self.history.extend(generated);

        Ok(reply)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Forget the running conversation; the next query starts fresh.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{LoopSettings, Orchestrator};
    use crate::audit::AuditLog;
    use crate::execution::ToolDispatcher;
    use crate::model::ScriptedModel;
    use crate::models::{Role, ToolCall};
    use crate::tools::{FunctionRegistry, InMemoryPlatform, ToolId};
    use serde_json::json;

    #[test]
    fn test_state_never_touches_seeded_turns() {
        let history = vec![Turn::user("a"), Turn::assistant("b"), Turn::user("c")];
        let mut state = ConversationState::seed(&history);
        assert!(state.appended().is_empty());

        state.push(Turn::user("tool output"));
        state.push(Turn::assistant("done"));

        assert_eq!(&state.turns()[..3], history.as_slice());
        assert_eq!(state.appended().len(), 2);
        assert_eq!(
            state.into_appended(),
            vec![Turn::user("tool output"), Turn::assistant("done")]
        );
    }

    async fn session(model: Arc<ScriptedModel>) -> ChatSession {
        let platform = InMemoryPlatform::new()
            .with_function(ToolId::GetTopTrendingTickers, |_| Ok(json!(["AAA", "BBB"])));
        let registry = FunctionRegistry::build(&platform, &ToolId::ANALYST_DEFAULTS).await;
        let orchestrator = Orchestrator::new(
            model,
            ToolDispatcher::new(Arc::new(registry)),
            LoopSettings::default(),
            AuditLog::new(),
        );

        ChatSession::new(Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn test_session_accumulates_history_across_queries() {
        let model = Arc::new(
            ScriptedModel::new()
                .then_call(vec![ToolCall::new("get_top_trending_tickers", json!({}))])
                .then_answer("AAA and BBB are moving.")
                .then_answer("AAA has the larger volume."),
        );
        let mut session = session(model.clone()).await;

        let first = session.ask("What's trending?").await.unwrap();
        assert_eq!(first, "AAA and BBB are moving.");
        assert_eq!(session.history().len(), 3);

        let second = session.ask("Which one is bigger?").await.unwrap();
        assert_eq!(second, "AAA has the larger volume.");

        let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );

        // The third model call saw the whole running history.
        assert_eq!(model.requests()[2].turns.len(), 4);
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected_locally() {
        let model = Arc::new(ScriptedModel::new());
        let mut session = session(model.clone()).await;

        let err = session.ask("   ").await.unwrap_err();

        assert!(matches!(err, OrchestrationError::InvalidInput(_)));
        assert!(session.history().is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clear_starts_a_fresh_conversation() {
        let model = Arc::new(
            ScriptedModel::new()
                .then_answer("first reply")
                .then_answer("second reply"),
        );
        let mut session = session(model.clone()).await;

        session.ask("hello").await.unwrap();
        assert_eq!(session.history().len(), 2);

        session.clear();
        assert!(session.history().is_empty());

        session.ask("again").await.unwrap();
        assert_eq!(model.requests()[1].turns, vec![Turn::user("again")]);
    }
}

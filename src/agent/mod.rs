//! Orchestration loop
//!
//! AWAITING_MODEL → (tool use) → EXECUTING_TOOLS → AWAITING_MODEL → … → DONE
//!
//! Each model call and each tool call is awaited before the next step starts;
//! tool calls from one response run one after another in the order given.

use crate::audit::{compute_history_hash, AuditLog};
use crate::conversation::ConversationState;
use crate::error::{FailureKind, OrchestrationError};
use crate::execution::ToolDispatcher;
use crate::model::{GenerationParams, ModelClient, ModelRequest, ModelResponse};
use crate::models::{
    ExecutionStatus, InvocationOutcome, InvocationRecord, ToolCall, ToolCallRecord, ToolResult,
    Turn,
};
use crate::prompt::SystemPrompt;
use crate::tools::{ToolId, ToolSchema};
use crate::Result;
use chrono::{Local, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const BLANK_INPUT_MESSAGE: &str = "Error: Please provide a valid query.";
const DEFAULT_MAX_ROUNDS: u32 = 8;

/// What happens to a tool call that produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailurePolicy {
    /// Append a failure-shaped turn so the model sees what went wrong.
    Report,
    /// Log and drop the call; no turn is appended.
    Skip,
}

impl FromStr for ToolFailurePolicy {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(ToolFailurePolicy::Report),
            "skip" => Ok(ToolFailurePolicy::Skip),
            other => Err(OrchestrationError::Config(format!(
                "unknown tool failure policy '{}', expected 'report' or 'skip'",
                other
            ))),
        }
    }
}

impl fmt::Display for ToolFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolFailurePolicy::Report => "report",
            ToolFailurePolicy::Skip => "skip",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub system_prompt: SystemPrompt,
    /// Tools advertised to the model, in this order.
    pub tools: Vec<ToolId>,
    pub params: GenerationParams,
    /// Maximum model invocations per call; 0 means unbounded.
    pub max_rounds: u32,
    pub failure_policy: ToolFailurePolicy,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            system_prompt: SystemPrompt::Analyst,
            tools: ToolId::ANALYST_DEFAULTS.to_vec(),
            params: GenerationParams::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            failure_policy: ToolFailurePolicy::Report,
        }
    }
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(InvocationOutcome),
}

#[derive(Default)]
struct InvocationTrace {
    rounds: u32,
    tool_calls: Vec<ToolCallRecord>,
}

/// Generated turns plus the id of their audit record.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub invocation_id: Uuid,
    pub turns: Vec<Turn>,
}

pub struct Orchestrator {
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    settings: LoopSettings,
    advertised: Vec<ToolSchema>,
    audit_log: AuditLog,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        dispatcher: ToolDispatcher,
        settings: LoopSettings,
        audit_log: AuditLog,
    ) -> Self {
        let advertised = dispatcher.registry().advertised_schemas(&settings.tools);

        info!(
            advertised = advertised.len(),
            max_rounds = settings.max_rounds,
            failure_policy = %settings.failure_policy,
            "Orchestrator initialized"
        );

        Self {
            model,
            dispatcher,
            settings,
            advertised,
            audit_log,
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn advertised_tools(&self) -> &[ToolSchema] {
        &self.advertised
    }

    /// Run the loop over `history` and return only the turns it generated.
    ///
    /// Never fails: validation errors, model failures and an exhausted round
    /// budget all come back as an assistant turn.
    pub async fn continue_conversation(&self, history: &[Turn]) -> Vec<Turn> {
        self.invoke(history).await.turns
    }

    /// Same as [`Orchestrator::continue_conversation`], also returning the id
    /// of the audit record left behind.
    pub async fn invoke(&self, history: &[Turn]) -> Invocation {
        let start_time = Instant::now();
        let invocation_id = Uuid::new_v4();
        let mut trace = InvocationTrace::default();

        info!(
            %invocation_id,
            history_len = history.len(),
            "Orchestrator: starting invocation"
        );

        let (turns, outcome) = if history.last().map_or(true, Turn::is_blank) {
            warn!(%invocation_id, "Last turn is blank, rejecting without calling the model");
            (
                vec![Turn::assistant(BLANK_INPUT_MESSAGE)],
                InvocationOutcome::Rejected,
            )
        } else {
            match self.run_loop(history, &mut trace).await {
                Ok(result) => result,
                Err(e) => {
                    let message = format!("Error generating analysis: {}", e);
                    error!(%invocation_id, error = %e, "Invocation aborted");
                    (vec![Turn::assistant(message)], InvocationOutcome::ModelFailed)
                }
            }
        };

        let record = InvocationRecord {
            invocation_id,
            history_hash: compute_history_hash(history),
            history_len: history.len(),
            rounds: trace.rounds,
            tool_calls: trace.tool_calls,
            outcome,
            turns_generated: turns.len(),
            created_at: Utc::now(),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        };
        self.audit_log.record(record).await;

        info!(
            %invocation_id,
            %outcome,
            rounds = trace.rounds,
            generated = turns.len(),
            "Orchestrator: invocation complete"
        );

        Invocation {
            invocation_id,
            turns,
        }
    }

    async fn run_loop(
        &self,
        history: &[Turn],
        trace: &mut InvocationTrace,
    ) -> Result<(Vec<Turn>, InvocationOutcome)> {
        let mut conversation = ConversationState::seed(history);
        let system = self.settings.system_prompt.render(Local::now());
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    trace.rounds += 1;

                    let response = self
                        .model
                        .respond(ModelRequest {
                            turns: conversation.turns(),
                            system: &system,
                            tools: &self.advertised,
                            params: &self.settings.params,
                        })
                        .await?;

                    match response {
                        ModelResponse::FinalAnswer(text) => {
                            debug!(round = trace.rounds, "Model returned a final answer");
                            conversation.push(Turn::assistant(text));
                            LoopState::Done(InvocationOutcome::Answered)
                        }
                        ModelResponse::ToolUse(calls) if calls.is_empty() => {
                            return Err(OrchestrationError::Llm(
                                "tool use requested without any tool calls".to_string(),
                            ));
                        }
                        ModelResponse::ToolUse(calls) if self.round_budget_spent(trace.rounds) => {
                            warn!(
                                round = trace.rounds,
                                pending_calls = calls.len(),
                                "Round limit reached, not executing further tool calls"
                            );
                            conversation.push(Turn::assistant(format!(
                                "Error: Stopped after {} rounds of tool calls without reaching a final answer.",
                                trace.rounds
                            )));
                            LoopState::Done(InvocationOutcome::RoundLimitReached)
                        }
                        ModelResponse::ToolUse(calls) => {
                            debug!(
                                round = trace.rounds,
                                calls = calls.len(),
                                "Model requested tools"
                            );
                            LoopState::ExecutingTools(calls)
                        }
                    }
                }

                LoopState::ExecutingTools(calls) => {
                    for call in calls {
                        if let Some(turn) = self.execute_call(call, trace).await {
                            conversation.push(turn);
                        }
                    }
                    LoopState::AwaitingModel
                }

                LoopState::Done(outcome) => return Ok((conversation.into_appended(), outcome)),
            };
        }
    }

    fn round_budget_spent(&self, rounds: u32) -> bool {
        self.settings.max_rounds > 0 && rounds >= self.settings.max_rounds
    }

    /// Dispatch one call and turn its outcome into at most one turn.
    async fn execute_call(&self, call: ToolCall, trace: &mut InvocationTrace) -> Option<Turn> {
        info!(tool_name = %call.name, arguments = ?call.arguments, "Executing tool call");

        let start = Instant::now();
        let outcome = self.dispatcher.invoke(&call).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        let (status, error_detail, turn) = match outcome {
            Ok(result) => (ExecutionStatus::Success, None, Some(result.into_turn())),
            Err(failure) => {
                let status = match failure.kind {
                    FailureKind::Execution => ExecutionStatus::Failed,
                    FailureKind::UnknownTool | FailureKind::Unavailable => {
                        ExecutionStatus::Skipped
                    }
                };
                let turn = match self.settings.failure_policy {
                    ToolFailurePolicy::Report => Some(
                        ToolResult::failure(failure.tool_name.clone(), failure.description.clone())
                            .into_turn(),
                    ),
                    ToolFailurePolicy::Skip => None,
                };

                (status, Some(failure.description), turn)
            }
        };

        trace.tool_calls.push(ToolCallRecord {
            round: trace.rounds,
            tool_name: call.name,
            arguments: call.arguments,
            status,
            error: error_detail,
            execution_time_ms,
        });

        turn
    }
}

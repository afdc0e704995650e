//! The Kubernetes debugging agent: a bounded plan-execute-reflect loop.
//!
//! One task = one freshly built roster + one [`DebugContext`], owned
//! exclusively by the loop. The loop plans once, then iterates: execute a
//! step, critique its output on the next pass, judge overall goal
//! completion, and reflect on the next instruction — until the judge accepts
//! or the step budget runs out, then writes the final report.
//!
//! Failure policy: every structured response is validated before any control
//! decision reads it, and a validation failure is terminal for the task. The
//! error text is emitted as the single final event and returned as the task
//! result.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::Settings;
use crate::contracts::{self, CriticDecision, Plan, StepInstruction, WorkflowError};
use crate::conversation::{extract_user_input, ChatDriver, ConversationResult, InboundMessage};
use crate::event::EventSink;
use crate::participants::{DebugRoster, Participant};
use crate::prompts;
use crate::state::{Phase, PhaseMachine};

/// Raw result of one executed step: everything the executor said plus every
/// raw tool output from the step's conversation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepOutput {
    #[serde(rename = "answer")]
    pub replies: Vec<String>,
    #[serde(rename = "sources")]
    pub tool_outputs: Vec<String>,
}

/// Mutable state of one debugging task.
///
/// `findings` and `steps_taken` are append-only and grow only on critic
/// acceptance; rejected step output is discarded and survives only as the
/// failure annotation folded into `last_step`.
#[derive(Debug, Default)]
pub struct DebugContext {
    pub goal: String,
    /// Initial plan steps; set once after planning, never mutated afterward.
    pub plan: Vec<String>,
    pub step_index: usize,
    pub findings: Vec<StepOutput>,
    pub steps_taken: Vec<String>,
    pub last_step: String,
    pub last_output: Option<StepOutput>,
    pub goal_unmet_reason: String,
}

impl DebugContext {
    fn findings_json(&self) -> String {
        json!(self.findings).to_string()
    }

    fn last_output_json(&self) -> String {
        json!(self.last_output).to_string()
    }
}

/// The plan-execute-reflect orchestrator for Kubernetes debugging.
pub struct KubernetesDebugAgent {
    driver: Arc<dyn ChatDriver>,
    eventer: Arc<dyn EventSink>,
    roster: DebugRoster,
    max_plan_steps: usize,
}

impl KubernetesDebugAgent {
    pub fn new(
        driver: Arc<dyn ChatDriver>,
        eventer: Arc<dyn EventSink>,
        settings: &Settings,
    ) -> Self {
        Self {
            driver,
            eventer,
            roster: DebugRoster::new(settings),
            max_plan_steps: settings.max_plan_steps,
        }
    }

    /// Run one task to completion.
    ///
    /// Returns either the synthesized report or the error description; the
    /// same text is emitted as the task's single final event.
    pub async fn execute(&self, messages: &[InboundMessage]) -> String {
        match self.run(messages).await {
            Ok(report) => {
                self.eventer.emit(&report, true).await;
                report
            }
            Err(err) => {
                let message = err.to_string();
                self.eventer.emit(&message, true).await;
                message
            }
        }
    }

    async fn run(&self, messages: &[InboundMessage]) -> Result<String, WorkflowError> {
        let mut ctx = DebugContext::default();
        let mut machine = PhaseMachine::new();

        ctx.goal = extract_user_input(messages)?;

        self.eventer.emit("Creating a plan...", false).await;
        let plan = self.generate_plan(&ctx.goal).await?;
        if plan.steps.is_empty() {
            return Err(WorkflowError::new(
                "Plan generation failed: no steps were provided.",
            ));
        }
        ctx.plan = plan.steps;

        let mut goal_met = false;
        for step_index in 0..self.max_plan_steps {
            ctx.step_index = step_index;
            machine.set_iteration(step_index as u32);

            let instruction = if step_index == 0 {
                // The first step is executed verbatim; there is no previous
                // step to critique and the judge has nothing to evaluate yet.
                machine.advance(Phase::Executing, Some("first planned step"))?;
                ctx.plan[0].clone()
            } else {
                machine.advance(Phase::Critiquing, None)?;
                self.review_last_step(&mut ctx).await?;

                machine.advance(Phase::Judging, None)?;
                let verdict = self.judge_goal(&mut ctx).await?;
                if verdict.decision {
                    goal_met = true;
                    break;
                }

                machine.advance(Phase::Reflecting, Some("goal unmet"))?;
                self.eventer.emit("Planning the next step...", false).await;
                let next = self.next_instruction(&ctx).await?;
                machine.advance(Phase::Executing, None)?;
                next.instruction
            };

            self.eventer
                .emit(&format!("Executing step: {instruction}"), false)
                .await;
            ctx.last_output = Some(self.execute_instruction(&ctx, &instruction).await?);
            ctx.last_step = instruction;
        }

        machine.advance(
            Phase::Summarizing,
            Some(if goal_met {
                "goal met"
            } else {
                "step budget exhausted"
            }),
        )?;
        self.eventer.emit("Summing up findings...", false).await;
        let report = self.summarize(&ctx).await?;
        machine.advance(Phase::Done, None)?;
        debug!(phases = %machine.summary(), "debugging task finished");

        Ok(report)
    }

    async fn invoke(
        &self,
        description: &str,
        participant: &Participant,
        message: &str,
        max_turns: Option<usize>,
    ) -> Result<ConversationResult, WorkflowError> {
        self.driver
            .invoke(participant, message, max_turns)
            .await
            .map_err(|e| WorkflowError::new(format!("{description} failed: {e}")))
    }

    async fn generate_plan(&self, goal: &str) -> Result<Plan, WorkflowError> {
        let convo = self
            .invoke("Plan generation", &self.roster.planner, goal, Some(1))
            .await?;
        contracts::parse_record(&convo).map_err(|v| v.into_workflow_error("Plan generation"))
    }

    /// Critique the previous step. Accepted output becomes a finding;
    /// rejected output is discarded and its failure reason is folded into
    /// `last_step` so the next reflection call sees why the attempt failed.
    async fn review_last_step(&self, ctx: &mut DebugContext) -> Result<(), WorkflowError> {
        let message = prompts::step_critic_message(
            &ctx.last_step,
            &ctx.findings_json(),
            &ctx.last_output_json(),
        );
        let convo = self
            .invoke("Step evaluation", &self.roster.step_critic, &message, Some(1))
            .await?;
        let verdict: CriticDecision =
            contracts::parse_record(&convo).map_err(|v| v.into_workflow_error("Step evaluation"))?;

        if verdict.decision {
            if let Some(output) = ctx.last_output.clone() {
                ctx.findings.push(output);
                ctx.steps_taken.push(ctx.last_step.clone());
            }
        } else {
            ctx.last_step = format!(
                "The previous step was {} but was not accomplished: {}.",
                ctx.last_step, verdict.explanation
            );
        }
        Ok(())
    }

    async fn judge_goal(&self, ctx: &mut DebugContext) -> Result<CriticDecision, WorkflowError> {
        let message = json!({
            "Goal": ctx.goal,
            "Plan": ctx.plan,
            "Information Gathered": ctx.findings,
        })
        .to_string();
        let convo = self
            .invoke(
                "Goal evaluation",
                &self.roster.goal_judge,
                &format!("```{message}```"),
                Some(1),
            )
            .await?;
        let verdict: CriticDecision =
            contracts::parse_record(&convo).map_err(|v| v.into_workflow_error("Goal evaluation"))?;

        if !verdict.decision {
            ctx.goal_unmet_reason = verdict.explanation.clone();
        }
        Ok(verdict)
    }

    async fn next_instruction(&self, ctx: &DebugContext) -> Result<StepInstruction, WorkflowError> {
        let message = json!({
            "Goal": ctx.goal,
            "Plan": ctx.plan,
            "Last Step": ctx.last_step,
            "Last Step Output": ctx.last_output,
            "Missing Info for Goal": ctx.goal_unmet_reason,
            "Steps Taken": ctx.steps_taken,
        })
        .to_string();
        let convo = self
            .invoke(
                "Next step planning",
                &self.roster.reflection,
                &format!("```{message}```"),
                Some(1),
            )
            .await?;
        contracts::parse_record(&convo).map_err(|v| v.into_workflow_error("Next step planning"))
    }

    async fn execute_instruction(
        &self,
        ctx: &DebugContext,
        instruction: &str,
    ) -> Result<StepOutput, WorkflowError> {
        if instruction.trim().is_empty() {
            return Err(WorkflowError::new(
                "Received an empty instruction to execute.",
            ));
        }

        let mut prompt = format!("Instruction: {instruction}");
        if !ctx.findings.is_empty() {
            prompt.push_str(&format!(
                "\nContextual Information:\n{}",
                ctx.findings_json()
            ));
        }

        let convo = self
            .invoke("Instruction execution", &self.roster.executor, &prompt, None)
            .await?;

        let replies = convo.replies_from(self.roster.executor.name);
        let tool_outputs = convo.tool_outputs();
        if replies.is_empty() && tool_outputs.is_empty() {
            return Err(WorkflowError::new(
                "Instruction execution produced no assistant response or tool output.",
            ));
        }

        Ok(StepOutput {
            replies,
            tool_outputs,
        })
    }

    async fn summarize(&self, ctx: &DebugContext) -> Result<String, WorkflowError> {
        let prompt = format!(
            "User's query: {}. Information Gathered: {}",
            ctx.goal,
            ctx.findings_json()
        );
        let convo = self
            .invoke(
                "Report generation",
                &self.roster.report_writer,
                &prompt,
                Some(1),
            )
            .await?;
        contracts::extract_text(&convo).map_err(|v| v.into_workflow_error("Report generation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_output_serializes_with_wire_keys() {
        let output = StepOutput {
            replies: vec!["##ANSWER## three pods".into()],
            tool_outputs: vec!["pod-a\npod-b\npod-c".into()],
        };
        let value = json!(output);
        assert!(value.get("answer").is_some());
        assert!(value.get("sources").is_some());
        assert!(value.get("replies").is_none());
    }

    #[test]
    fn findings_json_is_stable_for_empty_context() {
        let ctx = DebugContext::default();
        assert_eq!(ctx.findings_json(), "[]");
        assert_eq!(ctx.last_output_json(), "null");
    }
}

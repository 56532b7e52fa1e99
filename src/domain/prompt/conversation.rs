//! Prompts for the conversational workflow
//!
//! Each function formats a prompt from the conversation transcript and the
//! workflow state. Sending the prompt to a model is the caller's job.

use super::template::{render_template, TemplateError, TemplateState};

const SUMMARIZE_TEMPLATE: &str = "\
You are summarizing a conversation between a user and an assistant.
Current goal: {goal}

Conversation:
{conversation}

Write a concise summary of what has been discussed and decided so far.";

const EXTRACT_STATE_TEMPLATE: &str = "\
Read the conversation below and update the known state.
Known state:
{state}

Conversation:
{conversation}

Respond only with a JSON object such as {{\"key\": \"value\"}} containing every field that changed.";

const NEXT_TURN_TEMPLATE: &str = "\
You are a helpful assistant guiding the user toward: {goal}
Facts gathered so far:
{state}

Conversation:
{conversation}

Write the assistant's next reply. Ask at most one question.";

/// Placeholder used when the state has no `goal` entry
const DEFAULT_GOAL: &str = "help the user";

pub fn summarize_prompt(conversation: &str, state: &TemplateState) -> Result<String, TemplateError> {
    render_template(SUMMARIZE_TEMPLATE, &with_conversation(conversation, state))
}

pub fn extract_state_prompt(
    conversation: &str,
    state: &TemplateState,
) -> Result<String, TemplateError> {
    render_template(EXTRACT_STATE_TEMPLATE, &with_conversation(conversation, state))
}

pub fn next_turn_prompt(conversation: &str, state: &TemplateState) -> Result<String, TemplateError> {
    render_template(NEXT_TURN_TEMPLATE, &with_conversation(conversation, state))
}

fn with_conversation(conversation: &str, state: &TemplateState) -> TemplateState {
    let mut values = state.clone();

    values.insert("conversation".to_string(), conversation.into());
    values
        .entry("goal".to_string())
        .or_insert_with(|| DEFAULT_GOAL.into());
    values.insert("state".to_string(), format_state(state).into());

    values
}

/// One `- key: value` line per state entry, sorted by key
fn format_state(state: &TemplateState) -> String {
    if state.is_empty() {
        return "(none)".to_string();
    }

    let mut keys: Vec<&String> = state.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| match &state[key] {
            serde_json::Value::String(s) => format!("- {}: {}", key, s),
            other => format!("- {}: {}", key, other),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONVERSATION: &str = "user: I need a flight to Lisbon\nassistant: Which dates?";

    #[test]
    fn test_summarize_uses_goal_from_state() {
        let mut state = TemplateState::new();
        state.insert("goal".to_string(), json!("book a flight"));

        let prompt = summarize_prompt(CONVERSATION, &state).unwrap();

        assert!(prompt.contains("Current goal: book a flight"));
        assert!(prompt.contains("I need a flight to Lisbon"));
    }

    #[test]
    fn test_missing_goal_falls_back_to_default() {
        let prompt = next_turn_prompt(CONVERSATION, &TemplateState::new()).unwrap();

        assert!(prompt.contains("guiding the user toward: help the user"));
        assert!(prompt.contains("(none)"));
    }

    #[test]
    fn test_extract_state_lists_sorted_entries() {
        let mut state = TemplateState::new();
        state.insert("travelers".to_string(), json!(2));
        state.insert("destination".to_string(), json!("Lisbon"));

        let prompt = extract_state_prompt(CONVERSATION, &state).unwrap();

        assert!(prompt.contains("- destination: Lisbon\n- travelers: 2"));
        assert!(prompt.contains(r#"{"key": "value"}"#));
    }
}

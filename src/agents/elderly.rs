/// Elderly agent: turns an alert into a warm reminder and captures the reply.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lock_log;
use super::master::Responder;
use super::memory::Event;
use crate::llm::{GenerationClient, GenerationProfile};

pub const ACTION_BIRTHDAY_REMINDER: &str = "birthday_reminder_interaction";

pub const ELDERLY_PROFILE: GenerationProfile = GenerationProfile {
    agent: "elderly",
    system_prompt: "You are a friendly, empathetic AI assistant designed specifically for \
        elderly users. Your role is to:\n\
        1. Remind users about important dates and events in a warm, caring way\n\
        2. Help them stay connected with family members\n\
        3. Provide gentle suggestions for actions they can take\n\
        4. Use simple, clear language that's easy to understand\n\
        5. Be patient and supportive\n\n\
        Always speak in a warm, conversational tone as if talking to a dear friend.",
    max_output_tokens: 300,
    temperature: 0.8,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub event: Event,
    pub message: String,
    pub suggested_actions: String,
    pub reply: String,
    pub action_tag: String,
}

pub struct ElderlyAgent {
    generation: GenerationClient,
    interactions: Mutex<Vec<InteractionRecord>>,
}

impl ElderlyAgent {
    pub fn new(generation: GenerationClient) -> Self {
        Self {
            generation,
            interactions: Mutex::new(Vec::new()),
        }
    }

    pub fn interactions(&self) -> Vec<InteractionRecord> {
        lock_log(&self.interactions).clone()
    }
}

#[async_trait]
impl Responder for ElderlyAgent {
    async fn respond(&self, event: &Event, guidance: &str) -> InteractionRecord {
        let message = self
            .generation
            .generate_or_fallback(&ELDERLY_PROFILE, "reminder", reminder_prompt(event, guidance))
            .await;
        tracing::info!(event_id = %event.id, subject = %event.subject_name, "reminder composed");

        let suggested_actions = self
            .generation
            .generate_or_fallback(&ELDERLY_PROFILE, "suggestions", suggestions_prompt(event))
            .await;

        let reply = self
            .generation
            .generate_or_fallback(&ELDERLY_PROFILE, "simulated_reply", reply_prompt(&message))
            .await;
        tracing::info!(event_id = %event.id, chars = reply.len(), "user reply captured");

        let record = InteractionRecord {
            timestamp: Utc::now(),
            event: event.clone(),
            message,
            suggested_actions,
            reply,
            action_tag: ACTION_BIRTHDAY_REMINDER.to_string(),
        };
        lock_log(&self.interactions).push(record.clone());
        record
    }
}

fn reminder_prompt(event: &Event, guidance: &str) -> String {
    format!(
        "Generate a warm, personalized birthday reminder for an elderly user.\n\n\
         Birthday Info: {}\n\
         Master Agent Guidance: {}\n\n\
         Create a message that:\n\
         1. Is warm and personal\n\
         2. Mentions the person's name and relationship\n\
         3. Suggests ways to connect (call, message, etc.)\n\
         4. Uses simple, clear language\n\
         5. Feels like talking to a caring friend\n\n\
         Format your response as a natural conversation starter.",
        event.prompt_json(),
        guidance
    )
}

fn suggestions_prompt(event: &Event) -> String {
    format!(
        "Based on the birthday reminder for {}, generate 3-4 simple suggestions for the elderly user.\n\
         Make them actionable and easy to understand.\n\
         Examples: \"Would you like to call them?\", \"Should I help you send a message?\"",
        event.subject_name
    )
}

fn reply_prompt(message: &str) -> String {
    format!(
        "Generate a realistic response from an elderly user who just received this birthday reminder:\n\
         \"{}\"\n\n\
         The response should be:\n\
         1. Natural and conversational\n\
         2. Show interest in connecting\n\
         3. Maybe ask for help or clarification\n\
         4. Feel authentic to an elderly person\n\n\
         Generate just the user's response, nothing else.",
        message
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::calendar::MonthDay;
    use crate::llm::FALLBACK_TEXT;
    use crate::llm::testing::{ScriptedGenerator, scripted_client};

    fn alice() -> Event {
        Event {
            id: "alice".to_string(),
            subject_name: "Alice".to_string(),
            relationship_label: "daughter".to_string(),
            occurs_on: MonthDay::new(3, 15).unwrap(),
            attributes: Default::default(),
        }
    }

    #[tokio::test]
    async fn respond_runs_three_dependent_steps_in_order() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .respond_when("personalized birthday reminder", "Alice turns 4 today!")
                .respond_when("3-4 simple suggestions", "1. Call her")
                .respond_when("realistic response", "Oh lovely, let's call."),
        );
        let agent = ElderlyAgent::new(scripted_client(generator.clone()));

        let record = agent.respond(&alice(), "Be gentle.").await;

        assert_eq!(record.message, "Alice turns 4 today!");
        assert_eq!(record.suggested_actions, "1. Call her");
        assert_eq!(record.reply, "Oh lovely, let's call.");
        assert_eq!(record.action_tag, ACTION_BIRTHDAY_REMINDER);

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("Be gentle."));
        assert!(prompts[0].contains("\"name\": \"Alice\""));
        assert!(prompts[2].contains("Alice turns 4 today!"));

        let requests = generator.calls.lock().unwrap();
        assert!(requests.iter().all(|r| r.max_output_tokens == 300));
        assert!(requests[0].system_context.contains("elderly users"));

        assert_eq!(agent.interactions(), vec![record.clone()]);
    }

    #[tokio::test]
    async fn failed_reminder_still_produces_a_complete_record() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .fail_when("personalized birthday reminder")
                .respond_when("realistic response", "What was that?"),
        );
        let agent = ElderlyAgent::new(scripted_client(generator.clone()));

        let record = agent.respond(&alice(), "guidance").await;

        assert_eq!(record.message, FALLBACK_TEXT);
        assert_eq!(record.reply, "What was that?");
        assert_ne!(record.suggested_actions, FALLBACK_TEXT);
        assert_eq!(generator.call_count(), 3);
        assert!(generator.prompts()[2].contains(FALLBACK_TEXT));
        assert_eq!(agent.interactions().len(), 1);
    }

    #[tokio::test]
    async fn failed_reply_uses_fallback_slot_only() {
        let generator = Arc::new(ScriptedGenerator::new().fail_when("realistic response"));
        let agent = ElderlyAgent::new(scripted_client(generator.clone()));

        let record = agent.respond(&alice(), "guidance").await;

        assert_eq!(record.message, "reply-1");
        assert_eq!(record.suggested_actions, "reply-2");
        assert_eq!(record.reply, FALLBACK_TEXT);
    }
}

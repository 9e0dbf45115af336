/// Younger-relative agent: derives insights and follow-up suggestions from
/// the elderly user's reply.
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lock_log;
use super::master::Notifier;
use super::memory::Event;
use crate::llm::{GenerationClient, GenerationProfile};

pub const ACTION_INSIGHTS_PROVIDED: &str = "analyzed_and_insights_provided";

pub const RELATIVE_PROFILE: GenerationProfile = GenerationProfile {
    agent: "younger_relative",
    system_prompt: "You are a Younger Relative Agent that helps adult children and younger \
        family members stay connected with their elderly relatives. Your role is to:\n\
        1. Receive notifications about elderly relative interactions\n\
        2. Provide intelligent insights and suggestions\n\
        3. Help coordinate family connections\n\
        4. Suggest meaningful ways to engage with elderly family members\n\
        5. Consider emotional and practical aspects of family relationships\n\n\
        Always be supportive, understanding, and focused on strengthening family bonds.",
    max_output_tokens: 500,
    temperature: 0.7,
};

/// What the master agent knows about an interaction when it forwards a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionContext {
    pub event: Event,
    pub reminder_message: String,
    pub action_tag: String,
    pub analysis: Option<String>,
}

impl InteractionContext {
    fn prompt_json(&self) -> String {
        serde_json::to_string_pretty(&serde_json::json!({
            "birthday_info": self.event.prompt_value(),
            "reminder_message": self.reminder_message,
            "action": self.action_tag,
        }))
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub timestamp: DateTime<Utc>,
    pub reply: String,
    pub context: InteractionContext,
    pub insights: String,
    pub action_taken: String,
    /// Filled in once, right after the record is appended.
    pub suggestions: Option<String>,
}

pub struct YoungerRelativeAgent {
    generation: GenerationClient,
    notifications: Mutex<Vec<NotificationRecord>>,
}

impl YoungerRelativeAgent {
    pub fn new(generation: GenerationClient) -> Self {
        Self {
            generation,
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        lock_log(&self.notifications).clone()
    }
}

#[async_trait]
impl Notifier for YoungerRelativeAgent {
    async fn notify(&self, reply: &str, context: InteractionContext) {
        tracing::info!(event_id = %context.event.id, "notification received");

        let insights = self
            .generation
            .generate_or_fallback(&RELATIVE_PROFILE, "insights", insights_prompt(reply, &context))
            .await;

        let suggestions_input = suggestions_prompt(reply, &context.event, &insights);
        let index = {
            let mut log = lock_log(&self.notifications);
            log.push(NotificationRecord {
                timestamp: Utc::now(),
                reply: reply.to_string(),
                context,
                insights,
                action_taken: ACTION_INSIGHTS_PROVIDED.to_string(),
                suggestions: None,
            });
            log.len() - 1
        };

        let suggestions = self
            .generation
            .generate_or_fallback(&RELATIVE_PROFILE, "suggestions", suggestions_input)
            .await;

        let mut log = lock_log(&self.notifications);
        if let Some(record) = log.get_mut(index)
            && record.suggestions.is_none()
        {
            record.suggestions = Some(suggestions);
        }
    }
}

fn insights_prompt(reply: &str, context: &InteractionContext) -> String {
    format!(
        "Analyze this interaction between an elderly relative and the AI system:\n\n\
         Elderly Response: \"{}\"\n\
         Context: {}\n\
         Master Agent Analysis: {}\n\n\
         Provide insights and suggestions for the younger relative:\n\
         1. What does this interaction reveal about the elderly person's needs/desires?\n\
         2. What are the best ways to support this connection?\n\
         3. What follow-up actions would be meaningful?\n\
         4. Any emotional considerations to keep in mind?\n\
         5. Practical suggestions for staying connected\n\n\
         Format your response as helpful insights and actionable suggestions.",
        reply,
        context.prompt_json(),
        context.analysis.as_deref().unwrap_or("(none)")
    )
}

fn suggestions_prompt(reply: &str, event: &Event, insights: &str) -> String {
    format!(
        "Based on this interaction:\n\
         Elderly Response: \"{}\"\n\
         Birthday Info: {}\n\
         Insights: {}\n\n\
         Generate 3-5 specific, actionable suggestions for the younger relative.\n\
         Make them practical and meaningful. Examples:\n\
         - \"Send a video message sharing a childhood memory\"\n\
         - \"Schedule a weekly video call\"\n\
         - \"Create a shared photo album\"\n\n\
         Format as a numbered list of suggestions.",
        reply,
        event.prompt_json(),
        insights
    )
}

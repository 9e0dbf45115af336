/// Master agent: routes alerts to the elderly agent and replies on to the
/// younger relative, keeping a log of every hop.
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::elderly::InteractionRecord;
use super::lock_log;
use super::memory::Event;
use super::relative::InteractionContext;
use crate::error::RoutingError;
use crate::llm::{GenerationClient, GenerationProfile};

pub const MASTER_PROFILE: GenerationProfile = GenerationProfile {
    agent: "master",
    system_prompt: "You are a Master Agent that coordinates between specialized AI agents to \
        help reconnect families. Your role is to:\n\
        1. Receive alerts from the Memory Agent about important dates\n\
        2. Coordinate with the Elderly Agent to remind users about birthdays\n\
        3. Manage the flow of information between agents\n\
        4. Ensure smooth communication between family members\n\n\
        Always be helpful, empathetic, and focused on fostering family connections.",
    max_output_tokens: 500,
    temperature: 0.7,
};

#[async_trait]
pub trait Responder: Send + Sync {
    /// Never fails; failed generation steps carry fallback text.
    async fn respond(&self, event: &Event, guidance: &str) -> InteractionRecord;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, reply: &str, context: InteractionContext);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Responder,
    Notifier,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Responder => "responder",
            Role::Notifier => "notifier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role → agent mapping fixed at wiring time.
#[derive(Clone, Default)]
pub struct AgentRoster {
    responder: Option<Arc<dyn Responder>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AgentRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn responder(&self) -> Result<&Arc<dyn Responder>, RoutingError> {
        self.responder.as_ref().ok_or(RoutingError::UnregisteredRole {
            role: Role::Responder.label(),
        })
    }

    pub fn notifier(&self) -> Result<&Arc<dyn Notifier>, RoutingError> {
        self.notifier.as_ref().ok_or(RoutingError::UnregisteredRole {
            role: Role::Notifier.label(),
        })
    }

    pub fn registered_roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        if self.responder.is_some() {
            roles.push(Role::Responder);
        }
        if self.notifier.is_some() {
            roles.push(Role::Notifier);
        }
        roles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    AlertReceived,
    ReplyReceived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub payload: Value,
    pub derived_text: String,
}

pub struct MasterAgent {
    generation: GenerationClient,
    roster: AgentRoster,
    log: Mutex<Vec<ConversationLogEntry>>,
}

impl MasterAgent {
    pub fn new(generation: GenerationClient, roster: AgentRoster) -> Self {
        tracing::debug!(roles = ?roster.registered_roles(), "master agent wired");
        Self {
            generation,
            roster,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Produces guidance for the alert, then forwards it.
    pub async fn route_event(&self, event: &Event) -> Option<InteractionRecord> {
        tracing::info!(event_id = %event.id, subject = %event.subject_name, "birthday alert received");
        let guidance = self
            .generation
            .generate_or_fallback(&MASTER_PROFILE, "guidance", guidance_prompt(event))
            .await;
        self.route_event_with_guidance(event, guidance).await
    }

    /// Logs the alert, asks the responder for an interaction and hands its
    /// reply to [`MasterAgent::route_reply`]. Returns `None` when no responder
    /// is registered.
    pub async fn route_event_with_guidance(
        &self,
        event: &Event,
        guidance: String,
    ) -> Option<InteractionRecord> {
        self.append(LogKind::AlertReceived, event.prompt_value(), guidance.clone());

        let responder = match self.roster.responder() {
            Ok(responder) => responder,
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "skipping reminder");
                return None;
            }
        };

        let record = responder.respond(event, &guidance).await;
        let context = InteractionContext {
            event: record.event.clone(),
            reminder_message: record.message.clone(),
            action_tag: record.action_tag.clone(),
            analysis: None,
        };
        self.route_reply(&record.reply, context).await;
        Some(record)
    }

    /// Analyzes the reply, logs it and forwards it to the notifier.
    pub async fn route_reply(&self, reply: &str, mut context: InteractionContext) {
        tracing::info!(event_id = %context.event.id, "elderly user reply received");
        let analysis = self
            .generation
            .generate_or_fallback(&MASTER_PROFILE, "reply_analysis", analysis_prompt(reply, &context))
            .await;
        context.analysis = Some(analysis.clone());

        self.append(
            LogKind::ReplyReceived,
            json!({ "reply": reply, "context": &context }),
            analysis,
        );

        match self.roster.notifier() {
            Ok(notifier) => notifier.notify(reply, context).await,
            Err(err) => {
                tracing::warn!(event_id = %context.event.id, error = %err, "skipping notification");
            }
        }
    }

    pub fn conversation_log(&self) -> Vec<ConversationLogEntry> {
        lock_log(&self.log).clone()
    }

    fn append(&self, kind: LogKind, payload: Value, derived_text: String) {
        lock_log(&self.log).push(ConversationLogEntry {
            timestamp: Utc::now(),
            kind,
            payload,
            derived_text,
        });
    }
}

fn guidance_prompt(event: &Event) -> String {
    format!(
        "A birthday alert has been received for {} ({}).\n\n\
         Your task is to:\n\
         1. Determine the best way to remind the elderly user\n\
         2. Generate a warm, personalized message\n\
         3. Suggest appropriate actions\n\n\
         Birthday Info: {}\n\n\
         Generate a response that includes:\n\
         - A warm birthday reminder message\n\
         - Suggested actions (call, message, etc.)\n\
         - Any additional context that might be helpful",
        event.subject_name,
        event.relationship_label,
        event.prompt_json()
    )
}

fn analysis_prompt(reply: &str, context: &InteractionContext) -> String {
    let context_json = serde_json::to_string_pretty(&json!({
        "birthday_info": context.event.prompt_value(),
        "reminder_message": context.reminder_message,
        "action": context.action_tag,
    }))
    .unwrap_or_default();
    format!(
        "The elderly user has responded: \"{}\"\n\n\
         Context: {}\n\n\
         Analyze this response and determine:\n\
         1. What action the user wants to take\n\
         2. How to best support them\n\
         3. What information to share with the younger relative\n\
         4. Any follow-up actions needed",
        reply, context_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::elderly::ElderlyAgent;
    use crate::agents::relative::YoungerRelativeAgent;
    use crate::calendar::MonthDay;
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
    async fn route_event_logs_both_hops_and_reaches_both_agents() {
        let generator = Arc::new(
            ScriptedGenerator::new()
                .respond_when("A birthday alert has been received", "Remind her kindly.")
                .respond_when("The elderly user has responded", "She wants to call."),
        );
        let client = scripted_client(generator.clone());
        let elderly = Arc::new(ElderlyAgent::new(client.clone()));
        let relative = Arc::new(YoungerRelativeAgent::new(client.clone()));
        let roster = AgentRoster::new()
            .with_responder(elderly.clone())
            .with_notifier(relative.clone());
        let master = MasterAgent::new(client, roster);

        let record = master.route_event(&alice()).await.expect("responder is registered");

        let log = master.conversation_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, LogKind::AlertReceived);
        assert_eq!(log[0].derived_text, "Remind her kindly.");
        assert_eq!(log[0].payload["name"], "Alice");
        assert_eq!(log[1].kind, LogKind::ReplyReceived);
        assert_eq!(log[1].derived_text, "She wants to call.");
        assert_eq!(log[1].payload["reply"], json!(record.reply));

        assert_eq!(elderly.interactions().len(), 1);
        let notifications = relative.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].reply, record.reply);
        assert_eq!(notifications[0].context.analysis.as_deref(), Some("She wants to call."));
        assert_eq!(notifications[0].context.reminder_message, record.message);

        // guidance, reminder, suggestions, reply, analysis, insights, suggestions
        assert_eq!(generator.call_count(), 7);
        assert!(generator.prompts()[1].contains("Remind her kindly."));
    }

    #[tokio::test]
    async fn missing_responder_is_logged_and_skipped() {
        let generator = Arc::new(ScriptedGenerator::new());
        let client = scripted_client(generator.clone());
        let relative = Arc::new(YoungerRelativeAgent::new(client.clone()));
        let master = MasterAgent::new(client, AgentRoster::new().with_notifier(relative.clone()));

        assert!(master.route_event(&alice()).await.is_none());
        assert_eq!(master.conversation_log().len(), 1);
        assert!(relative.notifications().is_empty());
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_notifier_still_logs_the_reply() {
        let generator = Arc::new(ScriptedGenerator::new());
        let client = scripted_client(generator);
        let elderly = Arc::new(ElderlyAgent::new(client.clone()));
        let master = MasterAgent::new(client, AgentRoster::new().with_responder(elderly.clone()));

        let record = master
            .route_event_with_guidance(&alice(), "preset guidance".to_string())
            .await;

        assert!(record.is_some());
        let log = master.conversation_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].derived_text, "preset guidance");
        assert_eq!(log[1].kind, LogKind::ReplyReceived);
        assert_eq!(elderly.interactions().len(), 1);
    }

    #[test]
    fn roster_reports_unregistered_roles() {
        let roster = AgentRoster::new();
        assert!(roster.registered_roles().is_empty());
        assert_eq!(
            roster.responder().err(),
            Some(RoutingError::UnregisteredRole { role: "responder" })
        );
        assert_eq!(
            roster.notifier().err().map(|e| e.to_string()),
            Some("no agent registered for role 'notifier'".to_string())
        );
    }
}

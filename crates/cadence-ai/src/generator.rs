use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::workflows::followup::domain::StepAction;
use crate::workflows::leads::domain::{Channel, DiscProfile, Vertical};

/// What kind of draft the host is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationTask {
    FollowupGeneration,
    ObjectionResponse,
    Icebreaker,
}

/// Lead attributes the generator may interpolate. Deliberately narrow: the
/// core never ships raw store rows to an LLM boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftLeadAttributes {
    pub display_name: String,
    pub vertical: Vertical,
    #[serde(default)]
    pub disc: Option<DiscProfile>,
    #[serde(default)]
    pub channel: Option<Channel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub task: GenerationTask,
    pub lead: DraftLeadAttributes,
    pub template_key: String,
    #[serde(default)]
    pub step_action: Option<StepAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub content: String,
    pub model_id: String,
    pub tokens_used: u32,
    pub prompt_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("message generator timed out after {0:?}")]
    Timeout(Duration),
    #[error("message generator failed: {0}")]
    Failed(String),
}

/// Port to whatever produces message drafts. Implementations return a single
/// user-facing string; the core sanitizes before surfacing it.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, request: DraftRequest) -> Result<GeneratedMessage, GeneratorError>;
}

/// Run a generator call under a deadline. A timeout mutates no engine state;
/// the caller is free to retry.
pub async fn generate_with_timeout<G: MessageGenerator + ?Sized>(
    generator: &G,
    request: DraftRequest,
    timeout: Duration,
) -> Result<GeneratedMessage, GeneratorError> {
    match tokio::time::timeout(timeout, generator.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(GeneratorError::Timeout(timeout)),
    }
}

const META_PREFIXES: [&str; 6] = [
    "message:",
    "suggestion:",
    "draft:",
    "reply:",
    "antwort:",
    "nachricht:",
];

/// Reduce generator output to a single UI-safe paragraph: cut at the first
/// paragraph break and strip meta prefixes the models like to prepend.
pub fn sanitize_skeleton(raw: &str) -> String {
    let first_paragraph = raw
        .trim()
        .split("\n\n")
        .next()
        .unwrap_or_default()
        .replace('\n', " ");

    let mut text = first_paragraph.trim();
    loop {
        let lowered = text.to_lowercase();
        match META_PREFIXES
            .iter()
            .find(|prefix| lowered.starts_with(*prefix))
        {
            Some(prefix) => text = text[prefix.len()..].trim_start(),
            None => break,
        }
    }
    text.trim_matches('"').trim().to_string()
}

/// Deterministic generator used by the default wiring, the demo command, and
/// the tests. Real deployments plug an LLM-backed adapter into the same port.
#[derive(Debug, Default, Clone)]
pub struct TemplateGenerator;

#[async_trait]
impl MessageGenerator for TemplateGenerator {
    async fn generate(&self, request: DraftRequest) -> Result<GeneratedMessage, GeneratorError> {
        let first_name = request
            .lead
            .display_name
            .split_whitespace()
            .next()
            .unwrap_or("there")
            .to_string();

        let content = match request.task {
            GenerationTask::Icebreaker => format!(
                "Hi {first_name}, loved what you shared recently - open to a quick exchange?"
            ),
            GenerationTask::FollowupGeneration => match request.template_key.as_str() {
                "value_followup" | "nurture_value_drop" => format!(
                    "Hi {first_name}, I put together something that fits what you mentioned - want me to send it over?"
                ),
                "reactivation_ping" | "reactivation_last_call" => format!(
                    "Hi {first_name}, it has been a while - still curious about what we discussed?"
                ),
                _ => format!("Hi {first_name}, quick follow-up on my last note - what do you think?"),
            },
            GenerationTask::ObjectionResponse => format!(
                "Totally fair, {first_name} - would it help if I showed you how others handled that?"
            ),
        };

        Ok(GeneratedMessage {
            content,
            model_id: "template-v1".to_string(),
            tokens_used: 0,
            prompt_version: "builtin-1".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_cuts_at_first_paragraph_break() {
        let raw = "Hi Anna, quick check-in!\n\nHere is a long explanation of why I wrote this.";
        assert_eq!(sanitize_skeleton(raw), "Hi Anna, quick check-in!");
    }

    #[test]
    fn sanitize_strips_meta_prefixes() {
        assert_eq!(
            sanitize_skeleton("Message: Suggestion: Hi Anna, ready when you are."),
            "Hi Anna, ready when you are."
        );
    }

    #[test]
    fn sanitize_flattens_single_newlines() {
        assert_eq!(
            sanitize_skeleton("Hi Anna,\nready when you are."),
            "Hi Anna, ready when you are."
        );
    }

    #[tokio::test]
    async fn timeout_maps_to_generator_timeout() {
        struct SlowGenerator;

        #[async_trait]
        impl MessageGenerator for SlowGenerator {
            async fn generate(
                &self,
                _request: DraftRequest,
            ) -> Result<GeneratedMessage, GeneratorError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                unreachable!("the deadline fires first")
            }
        }

        tokio::time::pause();
        let request = DraftRequest {
            task: GenerationTask::Icebreaker,
            lead: DraftLeadAttributes {
                display_name: "Anna Demo".to_string(),
                vertical: Vertical::NetworkMarketing,
                disc: None,
                channel: None,
            },
            template_key: "icebreaker_first_touch".to_string(),
            step_action: None,
        };
        let call = generate_with_timeout(&SlowGenerator, request, Duration::from_millis(100));
        let result = call.await;
        assert!(matches!(result, Err(GeneratorError::Timeout(_))));
    }
}

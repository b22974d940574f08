//! Authoring tasks built on the provider manager and the template registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AiError;
use crate::manager::ProviderManager;
use crate::roles::AuthorRole;
use crate::template::{TemplateRegistry, variables_from_json};
use crate::types::{
    ChatMessage, ChatRequest, CompletionRequest, CompletionResult, GenerationOptions,
    ResponseFormat, ResultMetadata,
};

/// Reply of a role chat together with the role that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleReply {
    pub role: AuthorRole,
    pub result: CompletionResult,
}

/// Original and rewritten text of an optimization task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedText {
    pub original: String,
    pub optimized: String,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Important,
    Optional,
}

/// Scores between 0 and 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub structure: u8,
    pub character: u8,
    pub plot: u8,
    pub writing: u8,
    pub total: u8,
}

impl QualityScore {
    fn in_range(&self) -> bool {
        [
            self.structure,
            self.character,
            self.plot,
            self.writing,
            self.total,
        ]
        .iter()
        .all(|score| *score <= 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub scores: QualityScore,
    #[serde(default)]
    pub issues: Vec<QualityIssue>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Outcome of [`AuthoringService::analyze_quality`].
///
/// `report` is `None` when the model's output did not match the report shape;
/// the raw result is always kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityAnalysis {
    pub report: Option<QualityReport>,
    pub result: CompletionResult,
    /// When the provider's answer came back.
    pub analyzed_at: DateTime<Utc>,
}

/// Authoring operations over a shared manager and template set.
#[derive(Clone)]
pub struct AuthoringService {
    manager: Arc<ProviderManager>,
    templates: Arc<TemplateRegistry>,
    provider: Option<String>,
}

impl AuthoringService {
    pub fn new(manager: Arc<ProviderManager>, templates: Arc<TemplateRegistry>) -> Self {
        Self {
            manager,
            templates,
            provider: None,
        }
    }

    /// Routes every call to `provider` instead of the manager's default.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Chats as `role` (default: inspiration collector) using its prompt and sampling values.
    pub async fn role_chat(&self, role: Option<&str>, message: &str) -> Result<RoleReply, AiError> {
        let role = role
            .map(str::parse::<AuthorRole>)
            .transpose()?
            .unwrap_or_default();
        debug!(role = %role, "role chat");

        let request = ChatRequest::new(vec![ChatMessage::user(message)])
            .with_options(role_options(role));
        let result = self.manager.chat(self.provider(), request).await?;
        Ok(RoleReply { role, result })
    }

    pub async fn expand_inspiration(
        &self,
        context: &Map<String, Value>,
    ) -> Result<CompletionResult, AiError> {
        let variables = variables_from_json(context);
        self.complete_template("inspiration_development", &variables, ResponseFormat::Json)
            .await
    }

    pub async fn design_conflict(
        &self,
        context: &Map<String, Value>,
    ) -> Result<CompletionResult, AiError> {
        let variables = variables_from_json(context);
        self.complete_template("conflict_design", &variables, ResponseFormat::Json)
            .await
    }

    pub async fn character_profile(
        &self,
        context: &Map<String, Value>,
    ) -> Result<CompletionResult, AiError> {
        let variables = variables_from_json(context);
        self.complete_template("character_profile", &variables, ResponseFormat::Json)
            .await
    }

    pub async fn scene_content(
        &self,
        context: &Map<String, Value>,
    ) -> Result<CompletionResult, AiError> {
        let variables = variables_from_json(context);
        self.complete_template("scene_content", &variables, ResponseFormat::Text)
            .await
    }

    pub async fn optimize_show_not_tell(&self, content: &str) -> Result<OptimizedText, AiError> {
        let variables = HashMap::from([("content".to_string(), content.to_string())]);
        let result = self
            .complete_template("show_not_tell", &variables, ResponseFormat::Text)
            .await?;
        Ok(optimized(content, result))
    }

    /// Rewrites a dialogue; `context` may carry `character_info`, `scene_goal`
    /// and `optimization_focus` (default `all`).
    pub async fn optimize_dialogue(
        &self,
        content: &str,
        context: Option<&Map<String, Value>>,
    ) -> Result<OptimizedText, AiError> {
        let context = context.map(variables_from_json).unwrap_or_default();
        let lookup = |key: &str, default: &str| {
            context
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };
        let variables = HashMap::from([
            ("original_dialogue".to_string(), content.to_string()),
            ("character_info".to_string(), lookup("character_info", "")),
            ("scene_goal".to_string(), lookup("scene_goal", "")),
            (
                "optimization_focus".to_string(),
                lookup("optimization_focus", "all"),
            ),
        ]);

        let result = self
            .complete_template("dialogue_optimize", &variables, ResponseFormat::Text)
            .await?;
        Ok(optimized(content, result))
    }

    /// Reviews `content` as the quality inspector and decodes the scored report.
    pub async fn analyze_quality(
        &self,
        content_type: &str,
        content: &str,
    ) -> Result<QualityAnalysis, AiError> {
        let variables = HashMap::from([
            ("content_type".to_string(), content_type.to_string()),
            ("content".to_string(), content.to_string()),
        ]);
        let prompt = self.templates.fill_template("quality_analysis", &variables)?;
        let request = CompletionRequest {
            prompt,
            options: role_options(AuthorRole::QualityInspector),
            response_format: ResponseFormat::Json,
        };

        let result = self.manager.complete(self.provider(), request).await?;
        let analyzed_at = Utc::now();
        let report = result.structured_data.as_ref().and_then(decode_report);
        if report.is_none() {
            debug!("quality analysis output did not match the report shape");
        }
        Ok(QualityAnalysis {
            report,
            result,
            analyzed_at,
        })
    }

    async fn complete_template(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
        format: ResponseFormat,
    ) -> Result<CompletionResult, AiError> {
        let prompt = self.templates.fill_template(template_id, variables)?;
        debug!(template = template_id, "completing template");
        let request = CompletionRequest::new(prompt).with_response_format(format);
        self.manager.complete(self.provider(), request).await
    }

    fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }
}

fn role_options(role: AuthorRole) -> GenerationOptions {
    let profile = role.profile();
    GenerationOptions {
        system_prompt: Some(profile.system_prompt.to_string()),
        temperature: Some(profile.temperature),
        max_tokens: Some(profile.max_tokens),
        model: None,
    }
}

fn optimized(original: &str, result: CompletionResult) -> OptimizedText {
    OptimizedText {
        original: original.to_string(),
        optimized: result.text,
        metadata: result.metadata,
    }
}

fn decode_report(value: &Value) -> Option<QualityReport> {
    serde_json::from_value::<QualityReport>(value.clone())
        .ok()
        .filter(|report| report.scores.in_range())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_well_formed_report() {
        let value = json!({
            "scores": {"structure": 80, "character": 72, "plot": 65, "writing": 90, "total": 77},
            "issues": [{
                "type": "pacing",
                "severity": "important",
                "location": "chapter 3",
                "description": "The middle drags.",
                "suggestion": "Cut the second flashback."
            }],
            "suggestions": ["Raise the stakes earlier."]
        });
        let report = decode_report(&value).expect("report");
        assert_eq!(report.scores.total, 77);
        assert_eq!(report.issues[0].severity, Severity::Important);
        assert_eq!(report.issues[0].kind, "pacing");
        assert_eq!(report.suggestions, vec!["Raise the stakes earlier."]);
    }

    #[test]
    fn rejects_out_of_range_scores_and_unknown_severity() {
        let value = json!({
            "scores": {"structure": 180, "character": 1, "plot": 1, "writing": 1, "total": 1}
        });
        assert!(decode_report(&value).is_none());

        let value = json!({
            "scores": {"structure": 1, "character": 1, "plot": 1, "writing": 1, "total": 1},
            "issues": [{"type": "x", "severity": "urgent", "description": "d", "suggestion": "s"}]
        });
        assert!(decode_report(&value).is_none());
    }

    #[test]
    fn role_options_follow_profile() {
        let options = role_options(AuthorRole::QualityInspector);
        let profile = AuthorRole::QualityInspector.profile();
        assert_eq!(options.temperature, Some(profile.temperature));
        assert_eq!(options.max_tokens, Some(profile.max_tokens));
        assert_eq!(options.system_prompt.as_deref(), Some(profile.system_prompt));
        assert!(options.validate().is_ok());
    }
}

//! Prompt templates with `{name}` placeholders.
//!
//! `{{` and `}}` render as literal braces so templates can embed JSON skeletons.
//! A placeholder without a value renders as the empty string, unless the strict
//! variant is used.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AiError;

/// Matches `{{`, `}}` or a `{identifier}` placeholder.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// A parsed prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    id: String,
    content: String,
    /// Placeholder names in first-occurrence order, without duplicates.
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn parse(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut seen = HashSet::new();
        let variables = PLACEHOLDER
            .captures_iter(&content)
            .filter_map(|caps| caps.get(1))
            .map(|name| name.as_str().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect();

        Self {
            id: id.into(),
            content,
            variables,
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Renders the template, substituting missing variables with `""`.
    pub fn render(&self, values: &HashMap<String, String>) -> String {
        let mut missing = Vec::new();
        let rendered = self.render_inner(values, |name| {
            missing.push(name.to_string());
            Ok(())
        });

        if !missing.is_empty() {
            warn!(
                template = %self.id,
                missing = ?missing,
                "template variables missing; rendering them empty"
            );
        }
        // The lenient callback never fails.
        rendered.unwrap_or_default()
    }

    /// Renders the template, failing on the first placeholder without a value.
    pub fn render_strict(&self, values: &HashMap<String, String>) -> Result<String, AiError> {
        self.render_inner(values, |name| {
            Err(AiError::MissingVariable {
                template_id: self.id.clone(),
                name: name.to_string(),
            })
        })
    }

    fn render_inner(
        &self,
        values: &HashMap<String, String>,
        mut on_missing: impl FnMut(&str) -> Result<(), AiError>,
    ) -> Result<String, AiError> {
        let mut output = String::with_capacity(self.content.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.content) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&self.content[last..whole.start()]);
            match caps.get(1) {
                Some(name) => match values.get(name.as_str()) {
                    Some(value) => output.push_str(value),
                    None => on_missing(name.as_str())?,
                },
                // `{{` or `}}`: keep a single brace.
                None => output.push_str(&whole.as_str()[..1]),
            }
            last = whole.end();
        }

        output.push_str(&self.content[last..]);
        Ok(output)
    }
}

/// Immutable set of templates keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    /// Empty registry; add templates with [`TemplateRegistry::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the authoring templates.
    pub fn builtin() -> Self {
        BUILTIN_TEMPLATES
            .iter()
            .fold(Self::new(), |registry, (id, content)| {
                registry.register(*id, *content)
            })
    }

    /// Adds or replaces a template.
    pub fn register(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        let template = PromptTemplate::parse(id, content);
        self.templates.insert(template.id.clone(), template);
        self
    }

    pub fn get(&self, template_id: &str) -> Result<&PromptTemplate, AiError> {
        self.templates
            .get(template_id)
            .ok_or_else(|| AiError::TemplateNotFound {
                template_id: template_id.to_string(),
            })
    }

    /// Template ids in lexical order.
    pub fn template_ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Fills `template_id`; placeholders without a value become empty strings.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use novelflow_ai::template::TemplateRegistry;
    ///
    /// let registry = TemplateRegistry::new().register("rewrite", "Rewrite: {text}");
    /// let vars = HashMap::from([("text".to_string(), "He was sad.".to_string())]);
    /// assert_eq!(registry.fill_template("rewrite", &vars).unwrap(), "Rewrite: He was sad.");
    /// ```
    pub fn fill_template(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, AiError> {
        Ok(self.get(template_id)?.render(variables))
    }

    /// Like [`TemplateRegistry::fill_template`] but fails with
    /// [`AiError::MissingVariable`] on the first absent placeholder.
    pub fn fill_template_strict(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<String, AiError> {
        self.get(template_id)?.render_strict(variables)
    }

    pub fn template_variables(&self, template_id: &str) -> Result<&[String], AiError> {
        Ok(self.get(template_id)?.variables())
    }
}

/// Converts a JSON context object into template variables.
///
/// Strings are used verbatim, `null` is treated as absent and every other value
/// is rendered as compact JSON.
pub fn variables_from_json(context: &Map<String, Value>) -> HashMap<String, String> {
    context
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("inspiration_development", INSPIRATION_DEVELOPMENT),
    ("conflict_design", CONFLICT_DESIGN),
    ("character_profile", CHARACTER_PROFILE),
    ("scene_content", SCENE_CONTENT),
    ("show_not_tell", SHOW_NOT_TELL),
    ("dialogue_optimize", DIALOGUE_OPTIMIZE),
    ("quality_analysis", QUALITY_ANALYSIS),
];

const INSPIRATION_DEVELOPMENT: &str = r#"# Task: develop a story inspiration

## Inspiration
{inspiration}

## Project
Genre: {genre}
Theme: {theme}
Notes: {notes}

## Requirements
1. Identify the core appeal of the inspiration.
2. Propose three distinct directions it could grow into.
3. For each direction name the central conflict and the emotional hook.
4. Point out risks such as cliches or thin premises.

## Output
Reply with a single JSON object and nothing else:
{{"core_appeal": "...", "directions": [{{"title": "...", "premise": "...", "conflict": "...", "hook": "..."}}], "risks": ["..."]}}"#;

const CONFLICT_DESIGN: &str = r#"# Task: design conflict options for a scene

## Scene context
{scene_context}

## Characters involved
{characters}

## Desired conflict type
{conflict_type}

## Requirements
1. Offer three conflict options of increasing intensity.
2. Each option must arise from what the characters want.
3. State how each option changes the characters or the plot.

## Output
Reply with a single JSON object and nothing else:
{{"options": [{{"title": "...", "description": "...", "intensity": "low|medium|high", "consequences": "..."}}]}}"#;

const CHARACTER_PROFILE: &str = r#"# Task: build a character profile

## Character
Name: {name}
Role in the story: {role}
Known traits: {traits}

## Story context
{story_context}

## Requirements
1. Give the character a concrete want and a hidden need.
2. Describe a flaw that creates conflict.
3. Sketch a backstory event that explains the flaw.
4. Describe how the character speaks.

## Output
Reply with a single JSON object and nothing else:
{{"name": "...", "want": "...", "need": "...", "flaw": "...", "backstory": "...", "voice": "...", "arc": "..."}}"#;

const SCENE_CONTENT: &str = r#"# Task: write a scene

## Scene goal
{scene_goal}

## Setting
{setting}

## Characters
{characters}

## Previously
{previous_summary}

## Style
{style}

## Requirements
1. Open in the middle of the action.
2. Show emotions through action, detail and dialogue.
3. End the scene with a change or a question that pulls the reader on.

## Output
Write the scene text only, without explanations."#;

const SHOW_NOT_TELL: &str = r#"# Task: rewrite the text so it shows instead of tells

## Original text
{content}

## Requirements
1. Do not name emotions or states directly.
2. Show them through concrete actions, expressions and surroundings.
3. Engage the five senses.
4. Every detail must serve a purpose.
5. Keep the core information of the original.

## Output
Output the rewritten text only, without explanations."#;

const DIALOGUE_OPTIMIZE: &str = r#"# Task: improve a dialogue

## Original dialogue
{original_dialogue}

## Characters
{character_info}

## Scene goal
{scene_goal}

## Focus
{optimization_focus}

## Requirements
1. Give each character a distinct voice.
2. Add subtext; characters rarely say exactly what they mean.
3. Cut lines that only deliver exposition.
4. Make every exchange move the scene goal forward.

## Output
Output the improved dialogue only, without explanations."#;

const QUALITY_ANALYSIS: &str = r#"# Task: quality review

## Content type
{content_type}

## Content
{content}

## Requirements
Score structure, character, plot and writing from 0 to 100 and give a total.
List concrete issues with a severity of critical, important or optional,
where they occur and how to fix them. Finish with general suggestions.

## Output
Reply with a single JSON object and nothing else:
{{"scores": {{"structure": 0, "character": 0, "plot": 0, "writing": 0, "total": 0}}, "issues": [{{"type": "...", "severity": "critical", "location": "...", "description": "...", "suggestion": "..."}}], "suggestions": ["..."]}}"#;

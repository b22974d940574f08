use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Authoring persona used for role chats and role-specific completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    #[default]
    InspirationCollector,
    StructureArchitect,
    CharacterDesigner,
    PlotWeaver,
    DialogueGenerator,
    SceneRenderer,
    RhythmAdjuster,
    TextPolisher,
    QualityInspector,
}

/// Prompt and sampling values attached to a role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleProfile {
    pub display_name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AuthorRole {
    pub const ALL: [AuthorRole; 9] = [
        Self::InspirationCollector,
        Self::StructureArchitect,
        Self::CharacterDesigner,
        Self::PlotWeaver,
        Self::DialogueGenerator,
        Self::SceneRenderer,
        Self::RhythmAdjuster,
        Self::TextPolisher,
        Self::QualityInspector,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::InspirationCollector => "inspiration_collector",
            Self::StructureArchitect => "structure_architect",
            Self::CharacterDesigner => "character_designer",
            Self::PlotWeaver => "plot_weaver",
            Self::DialogueGenerator => "dialogue_generator",
            Self::SceneRenderer => "scene_renderer",
            Self::RhythmAdjuster => "rhythm_adjuster",
            Self::TextPolisher => "text_polisher",
            Self::QualityInspector => "quality_inspector",
        }
    }

    pub fn profile(self) -> RoleProfile {
        match self {
            Self::InspirationCollector => RoleProfile {
                display_name: "Inspiration Collector",
                description: "Draws out and records story ideas through open questions.",
                system_prompt: "You are an inspiration collector for a novelist. Ask open, \
                    curious questions, reflect the writer's ideas back in sharper form and \
                    suggest unexpected angles. Never judge an idea too early.",
                temperature: 0.9,
                max_tokens: 2000,
            },
            Self::StructureArchitect => RoleProfile {
                display_name: "Structure Architect",
                description: "Shapes the story into acts, chapters and turning points.",
                system_prompt: "You are a story structure architect. Organize ideas into \
                    acts, chapters and turning points, check pacing across the whole book and \
                    explain structural choices briefly.",
                temperature: 0.6,
                max_tokens: 4000,
            },
            Self::CharacterDesigner => RoleProfile {
                display_name: "Character Designer",
                description: "Builds characters with wants, needs, flaws and arcs.",
                system_prompt: "You are a character designer. Give every character a \
                    concrete want, a hidden need and a flaw that causes trouble. Keep \
                    characters consistent with what the writer has already established.",
                temperature: 0.8,
                max_tokens: 3000,
            },
            Self::PlotWeaver => RoleProfile {
                display_name: "Plot Weaver",
                description: "Connects events into causal plot lines and conflicts.",
                system_prompt: "You are a plot weaver. Link events through cause and effect, \
                    plant setups that pay off later and escalate conflict so that every \
                    chapter raises the stakes.",
                temperature: 0.8,
                max_tokens: 3000,
            },
            Self::DialogueGenerator => RoleProfile {
                display_name: "Dialogue Generator",
                description: "Writes dialogue with distinct voices and subtext.",
                system_prompt: "You are a dialogue writer. Give each character a distinct \
                    voice, let subtext carry emotion and keep exposition out of speech.",
                temperature: 0.85,
                max_tokens: 2500,
            },
            Self::SceneRenderer => RoleProfile {
                display_name: "Scene Renderer",
                description: "Turns scene outlines into vivid prose.",
                system_prompt: "You are a scene writer. Render scenes through concrete \
                    sensory detail and action, show rather than tell and end each scene with \
                    forward momentum.",
                temperature: 0.8,
                max_tokens: 4000,
            },
            Self::RhythmAdjuster => RoleProfile {
                display_name: "Rhythm Adjuster",
                description: "Tunes pacing and sentence rhythm.",
                system_prompt: "You are a prose rhythm editor. Vary sentence length, speed up \
                    action, slow down emotional beats and point out passages that drag.",
                temperature: 0.5,
                max_tokens: 3000,
            },
            Self::TextPolisher => RoleProfile {
                display_name: "Text Polisher",
                description: "Polishes wording without changing meaning.",
                system_prompt: "You are a line editor. Tighten wording, remove repetition and \
                    cliches and keep the author's voice and meaning intact.",
                temperature: 0.4,
                max_tokens: 4000,
            },
            Self::QualityInspector => RoleProfile {
                display_name: "Quality Inspector",
                description: "Reviews manuscripts and reports scored issues.",
                system_prompt: "You are a manuscript quality inspector. Evaluate structure, \
                    characters, plot and writing objectively, score each from 0 to 100 and \
                    report concrete issues with severity and a suggested fix. Answer in JSON \
                    when asked to.",
                temperature: 0.3,
                max_tokens: 4000,
            },
        }
    }
}

impl fmt::Display for AuthorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AuthorRole {
    type Err = AiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.id() == value)
            .ok_or_else(|| AiError::RoleNotFound {
                role: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_str() {
        for role in AuthorRole::ALL {
            assert_eq!(role.id().parse::<AuthorRole>().unwrap(), role);
            assert_eq!(
                serde_json::to_value(role).unwrap(),
                serde_json::Value::String(role.id().to_string())
            );
        }
    }

    #[test]
    fn unknown_role_is_reported() {
        let err = "ghost_writer".parse::<AuthorRole>().unwrap_err();
        assert_eq!(err.to_string(), "AI role 'ghost_writer' not found");
    }

    #[test]
    fn default_role_is_inspiration_collector() {
        assert_eq!(AuthorRole::default(), AuthorRole::InspirationCollector);
    }

    #[test]
    fn profiles_use_valid_sampling_values() {
        for role in AuthorRole::ALL {
            let profile = role.profile();
            assert!((0.0..=2.0).contains(&profile.temperature), "{role}");
            assert!(profile.max_tokens > 0, "{role}");
            assert!(!profile.system_prompt.is_empty(), "{role}");
        }
    }
}

//! Capability cards served at `/.well-known/agent.json`.

use super::AgentDomainError;
use crate::catalog::domain::{InputSchema, NAMESPACE_SEPARATOR, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

/// Organisation publishing an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProvider {
    /// Organisation name.
    pub organization: String,
    /// Organisation homepage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

/// One skill an agent can perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    /// Stable identifier, used as the tool name.
    pub id: String,
    /// Human-readable name, used as the tool title.
    #[serde(default)]
    pub name: String,
    /// What the skill does.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Free-form classification tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Example requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl AgentSkill {
    /// Creates a skill with an identifier and description.
    #[must_use]
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let identifier = id.into();
        Self {
            name: identifier.clone(),
            id: identifier,
            description: description.into(),
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }
}

/// Returns the input schema shared by every agent skill tool.
#[must_use]
pub fn skill_input_schema() -> InputSchema {
    InputSchema::object().with_property(
        "message",
        json!({
            "type": "string",
            "description": "Natural language message describing what you want the agent to do"
        }),
        true,
    )
}

/// Self-description an agent publishes for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Agent name.
    pub name: String,
    /// What the agent does.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON-RPC endpoint for messages; the discovery endpoint when empty.
    #[serde(default)]
    pub url: String,
    /// Agent version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Publishing organisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    /// Optional protocol features, kept verbatim.
    #[serde(default)]
    pub capabilities: Map<String, Value>,
    /// Advertised skills.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
    /// Accepted input media types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_input_modes: Vec<String>,
    /// Produced output media types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_output_modes: Vec<String>,
}

impl AgentCard {
    /// Creates a card without skills.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            version: String::new(),
            provider: None,
            capabilities: Map::new(),
            skills: Vec::new(),
            default_input_modes: Vec::new(),
            default_output_modes: Vec::new(),
        }
    }

    /// Appends a skill.
    #[must_use]
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Looks up a skill by identifier.
    #[must_use]
    pub fn skill(&self, id: &str) -> Option<&AgentSkill> {
        self.skills.iter().find(|skill| skill.id == id)
    }

    /// Checks that skill identifiers are present, unique and usable as tool
    /// names.
    ///
    /// # Errors
    ///
    /// Returns the first [`AgentDomainError`] found.
    pub fn validate(&self) -> Result<(), AgentDomainError> {
        let mut seen = HashSet::new();
        for skill in &self.skills {
            let id = skill.id.trim();
            if id.is_empty() {
                return Err(AgentDomainError::EmptySkillId {
                    agent: self.name.clone(),
                });
            }
            if id.contains(NAMESPACE_SEPARATOR) || id.chars().any(char::is_whitespace) {
                return Err(AgentDomainError::InvalidSkillId {
                    agent: self.name.clone(),
                    skill: skill.id.clone(),
                });
            }
            if !seen.insert(id) {
                return Err(AgentDomainError::DuplicateSkill {
                    agent: self.name.clone(),
                    skill: skill.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Converts every skill into a tool definition.
    #[must_use]
    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.skills
            .iter()
            .filter_map(|skill| {
                ToolDefinition::new(&skill.id, &skill.description, skill_input_schema())
                    .ok()
                    .map(|tool| tool.with_title(&skill.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn card_parses_wire_shape() {
        let card: AgentCard = serde_json::from_value(json!({
            "name": "Research Agent",
            "url": "http://research:9000/rpc",
            "version": "1.2.0",
            "capabilities": {"streaming": false},
            "skills": [
                {"id": "summarize", "name": "Summarize", "description": "Summarises text"}
            ],
            "defaultInputModes": ["text"]
        }))
        .expect("card should parse");

        assert_eq!(card.url, "http://research:9000/rpc");
        assert_eq!(card.default_input_modes, ["text"]);
        assert_eq!(card.skill("summarize").map(|skill| skill.name.as_str()), Some("Summarize"));
    }

    #[test]
    fn skills_become_message_tools() {
        let card = AgentCard::new("research", "").with_skill(AgentSkill::new("summarize", "Summarises text"));

        let tools = card.tools();

        let tool = tools.first().expect("one tool");
        assert_eq!(tool.name(), "summarize");
        assert_eq!(tool.input_schema().required, ["message"]);
        assert!(tool.input_schema().properties.contains_key("message"));
    }

    #[rstest]
    #[case::empty(AgentSkill::new(" ", ""), "without an id")]
    #[case::separator(AgentSkill::new("a__b", ""), "not a valid tool name")]
    #[case::whitespace(AgentSkill::new("two words", ""), "not a valid tool name")]
    fn invalid_skill_ids_are_rejected(#[case] skill: AgentSkill, #[case] message: &str) {
        let card = AgentCard::new("research", "").with_skill(skill);

        let err = card.validate().expect_err("card is invalid");

        assert!(err.to_string().contains(message), "unexpected error: {err}");
    }

    #[test]
    fn duplicate_skill_ids_are_rejected() {
        let card = AgentCard::new("research", "")
            .with_skill(AgentSkill::new("summarize", ""))
            .with_skill(AgentSkill::new("summarize", ""));

        assert!(matches!(
            card.validate(),
            Err(AgentDomainError::DuplicateSkill { .. })
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TurnRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            // "model" is what older records used for replies
            "assistant" | "model" => Ok(TurnRole::Assistant),
            other => Err(anyhow::anyhow!("unknown turn role: {}", other)),
        }
    }
}

impl From<TurnRole> for llm::Role {
    fn from(role: TurnRole) -> Self {
        match role {
            TurnRole::User => llm::Role::User,
            TurnRole::Assistant => llm::Role::Assistant,
        }
    }
}

/// One message of a conversation. Immutable once persisted.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: TurnRole, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at,
        }
    }

    pub fn user(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(TurnRole::User, content, created_at)
    }

    pub fn assistant(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::new(TurnRole::Assistant, content, created_at)
    }
}

impl From<&ConversationTurn> for llm::ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        llm::ChatMessage::new(turn.role.into(), turn.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_json_shape() {
        let created_at = DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let turn = ConversationTurn::assistant("Check line 12.", created_at);

        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            serde_json::json!({
                "role": "assistant",
                "content": "Check line 12.",
                "createdAt": "2026-10-15T12:00:00Z"
            })
        );
    }

    #[test]
    fn test_role_parsing_accepts_model() {
        assert_eq!("model".parse::<TurnRole>().unwrap(), TurnRole::Assistant);
        assert_eq!("user".parse::<TurnRole>().unwrap(), TurnRole::User);
        assert!("system".parse::<TurnRole>().is_err());
    }
}

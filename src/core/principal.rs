use crate::core::error::ParleyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The identity on whose behalf an invocation is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Principal {
    HumanAdmin,
    Assistant,
    BackgroundAgent,
    System,
}

impl Principal {
    pub const ALL: [Principal; 4] = [
        Principal::HumanAdmin,
        Principal::Assistant,
        Principal::BackgroundAgent,
        Principal::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Principal::HumanAdmin => "human-admin",
            Principal::Assistant => "assistant",
            Principal::BackgroundAgent => "background-agent",
            Principal::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Principal> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        Principal::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Principal {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Principal::parse(s)
            .ok_or_else(|| ParleyError::ValidationError(format!("unknown principal '{}'", s.trim())))
    }
}

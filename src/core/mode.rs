//! Operating modes and per-request mode resolution.
//!
//! A mode bounds which command categories are reachable at all during one
//! processing pass. It is chosen once per request and never changes
//! mid-pass.

use crate::core::error::ParleyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating posture for a pass, ordered from most to least restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Read-only chat: no execution, no writes.
    ChatOnly,
    /// Read plus sandboxed execution, no writes.
    Hybrid,
    /// Read, write and execute.
    Autonomous,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::ChatOnly, Mode::Hybrid, Mode::Autonomous];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::ChatOnly => "chat-only",
            Mode::Hybrid => "hybrid",
            Mode::Autonomous => "autonomous",
        }
    }

    /// Small-integer wire form accepted from callers.
    pub fn code(self) -> u8 {
        match self {
            Mode::ChatOnly => 0,
            Mode::Hybrid => 1,
            Mode::Autonomous => 2,
        }
    }

    pub fn parse(raw: &str) -> Option<Mode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat-only" | "chat_only" | "chatonly" | "chat" | "0" => Some(Mode::ChatOnly),
            "hybrid" | "1" => Some(Mode::Hybrid),
            "autonomous" | "auto" | "2" => Some(Mode::Autonomous),
            _ => None,
        }
    }

    /// The more restrictive of two modes.
    pub fn narrowest(self, other: Mode) -> Mode {
        self.min(other)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::parse(s).ok_or_else(|| {
            ParleyError::ValidationError(format!(
                "unknown mode '{}' (expected chat-only, hybrid or autonomous)",
                s.trim()
            ))
        })
    }
}

/// Mode hints carried by the request and by the session it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Mode asked for by this request, if any.
    #[serde(default)]
    pub request_mode: Option<String>,
    /// Mode configured on the session, if any.
    #[serde(default)]
    pub session_mode: Option<String>,
}

impl RequestContext {
    pub fn with_request_mode(mode: impl Into<String>) -> Self {
        Self {
            request_mode: Some(mode.into()),
            session_mode: None,
        }
    }

    pub fn with_session_mode(mut self, mode: impl Into<String>) -> Self {
        self.session_mode = Some(mode.into());
        self
    }
}

/// Determines the active mode for one pass.
///
/// Unknown or missing values resolve to `ChatOnly`. When both the request and
/// the session carry a mode, the narrower one wins, so a request can lower
/// its session's posture but never raise it.
pub fn resolve_mode(ctx: &RequestContext) -> Mode {
    let parse = |raw: &Option<String>| raw.as_deref().map(|v| Mode::parse(v).unwrap_or(Mode::ChatOnly));
    match (parse(&ctx.request_mode), parse(&ctx.session_mode)) {
        (Some(request), Some(session)) => request.narrowest(session),
        (Some(mode), None) | (None, Some(mode)) => mode,
        (None, None) => Mode::ChatOnly,
    }
}

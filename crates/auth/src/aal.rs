//! Authenticator assurance levels.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How strongly the current session was authenticated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aal {
    /// Single factor.
    Aal1,
    /// Second factor completed.
    Aal2,
}

impl Aal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aal::Aal1 => "aal1",
            Aal::Aal2 => "aal2",
        }
    }

    /// Lenient parse of backend strings; anything unknown is treated as `aal1`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "aal2" | "aal3" => Aal::Aal2,
            _ => Aal::Aal1,
        }
    }
}

impl core::fmt::Display for Aal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tolerated drift between this host's clock and the identity backend's.
pub const MAX_CLOCK_SKEW: Duration = Duration::seconds(30);

/// Per-request assurance snapshot; never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct AssuranceLevel {
    /// Level the session currently holds.
    pub current: Aal,
    /// Highest level the user could reach with their configured factors.
    pub available: Aal,
    /// The latest second-factor authentication happened inside the step-up window.
    pub recent_aal2: bool,
}

impl AssuranceLevel {
    pub fn new(current: Aal, available: Aal, recent_aal2: bool) -> Self {
        Self {
            current,
            available,
            recent_aal2,
        }
    }

    /// Build from the time the latest `aal2` method completed.
    ///
    /// Completion times up to [`MAX_CLOCK_SKEW`] ahead of `now` count as recent.
    pub fn from_last_aal2(
        current: Aal,
        available: Aal,
        last_aal2_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let recent_aal2 = last_aal2_at.is_some_and(|at| at <= now + MAX_CLOCK_SKEW && now - at <= window);
        Self::new(current, available, recent_aal2)
    }

    /// Whether the user must re-verify before a sensitive mutation.
    ///
    /// True when the session is below what the user could reach, or when it is
    /// at `aal2` but the second factor is stale.
    pub fn requires_step_up(&self) -> bool {
        self.current != self.available || (self.current == Aal::Aal2 && !self.recent_aal2)
    }
}

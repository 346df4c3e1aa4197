use crate::error::{AgileError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const HISTORY_LIMIT: usize = 200;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    SetupVerification,
    StakeholderDiscovery,
    Research,
    Requirements,
    Planning,
    Implementation,
    QualityAssurance,
    Deployment,
    Completed,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[
            Phase::SetupVerification,
            Phase::StakeholderDiscovery,
            Phase::Research,
            Phase::Requirements,
            Phase::Planning,
            Phase::Implementation,
            Phase::QualityAssurance,
            Phase::Deployment,
            Phase::Completed,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Phase> {
        Phase::all().get(self.index() + 1).copied()
    }

    /// 0 at the first phase, 100 at `Completed`.
    pub fn progress_percentage(self) -> u8 {
        let last = Phase::all().len() - 1;
        ((self.index() * 100) / last) as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::SetupVerification => "setup_verification",
            Phase::StakeholderDiscovery => "stakeholder_discovery",
            Phase::Research => "research",
            Phase::Requirements => "requirements",
            Phase::Planning => "planning",
            Phase::Implementation => "implementation",
            Phase::QualityAssurance => "quality_assurance",
            Phase::Deployment => "deployment",
            Phase::Completed => "completed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = AgileError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Phase::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s || p.as_str().replace('_', "-") == s)
            .ok_or_else(|| AgileError::InvalidPhase(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// WorkflowStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Active,
    AwaitingApproval,
    Blocked,
    Completed,
}

impl WorkflowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStatus::Active => "active",
            WorkflowStatus::AwaitingApproval => "awaiting_approval",
            WorkflowStatus::Blocked => "blocked",
            WorkflowStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    pub outcome: String,
    pub phase: Phase,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub current_phase: Phase,
    pub progress_percentage: u8,
    #[serde(default)]
    pub active_sprint: Option<String>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub blockers: Vec<String>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            current_phase: Phase::SetupVerification,
            progress_percentage: 0,
            active_sprint: None,
            status: WorkflowStatus::Active,
            blockers: Vec::new(),
            last_activity: Utc::now(),
            next_action: None,
            history: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::workflow_state_path(root);
        let Some(data) = crate::io::read_optional(&path)? else {
            return Err(AgileError::NotInitialized);
        };
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&paths::workflow_state_path(root), data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn invalid(&self, reason: impl Into<String>) -> AgileError {
        AgileError::InvalidTransition {
            from: format!("{} ({})", self.current_phase, self.status),
            reason: reason.into(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Ask for operator approval to leave the current phase.
    pub fn request_advance(&mut self) -> Result<()> {
        match self.status {
            WorkflowStatus::Active => {}
            WorkflowStatus::AwaitingApproval => {
                return Err(self.invalid("approval already requested"))
            }
            WorkflowStatus::Blocked => {
                return Err(self.invalid(format!("blocked by: {}", self.blockers.join(", "))))
            }
            WorkflowStatus::Completed => return Err(self.invalid("workflow is complete")),
        }
        self.status = WorkflowStatus::AwaitingApproval;
        self.next_action = self
            .current_phase
            .next()
            .map(|p| format!("approve transition to {p}"));
        self.touch();
        Ok(())
    }

    /// Operator approval: advance exactly one phase.
    pub fn approve(&mut self) -> Result<Phase> {
        if self.status != WorkflowStatus::AwaitingApproval {
            return Err(self.invalid("no approval pending"));
        }
        let next = self
            .current_phase
            .next()
            .ok_or_else(|| self.invalid("no phase after completed"))?;
        self.current_phase = next;
        self.progress_percentage = next.progress_percentage();
        self.status = if next == Phase::Completed {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Active
        };
        self.next_action = None;
        self.touch();
        Ok(next)
    }

    /// Operator rejection: stay in the current phase.
    pub fn reject(&mut self) -> Result<()> {
        if self.status != WorkflowStatus::AwaitingApproval {
            return Err(self.invalid("no approval pending"));
        }
        self.status = WorkflowStatus::Active;
        self.next_action = Some(format!("rework {}", self.current_phase));
        self.touch();
        Ok(())
    }

    pub fn block(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.status == WorkflowStatus::Completed {
            return Err(self.invalid("workflow is complete"));
        }
        let reason = reason.into();
        if !self.blockers.contains(&reason) {
            self.blockers.push(reason);
        }
        self.status = WorkflowStatus::Blocked;
        self.touch();
        Ok(())
    }

    pub fn unblock(&mut self) -> Result<()> {
        if self.status != WorkflowStatus::Blocked {
            return Err(self.invalid("not blocked"));
        }
        self.blockers.clear();
        self.status = WorkflowStatus::Active;
        self.touch();
        Ok(())
    }

    pub fn set_sprint(&mut self, sprint: Option<String>) {
        self.active_sprint = sprint;
        self.touch();
    }

    /// Note a dispatched command in the history.
    pub fn record_dispatch(&mut self, command: &str, outcome: &str) {
        self.history.push(HistoryEntry {
            command: command.to_string(),
            outcome: outcome.to_string(),
            phase: self.current_phase,
            timestamp: Utc::now(),
        });
        if self.history.len() > HISTORY_LIMIT {
            self.history.drain(..self.history.len() - HISTORY_LIMIT);
        }
        self.touch();
    }

    pub fn last_dispatch(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Dispatches recorded while the workflow was in `phase`, oldest first.
    pub fn history_in(&self, phase: Phase) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().filter(move |e| e.phase == phase)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut state = WorkflowState::new();
        state.set_sprint(Some("sprint-3".into()));
        state.record_dispatch("debug", "completed");
        state.save(dir.path()).unwrap();

        let loaded = WorkflowState::load(dir.path()).unwrap();
        assert_eq!(loaded.current_phase, Phase::SetupVerification);
        assert_eq!(loaded.active_sprint.as_deref(), Some("sprint-3"));
        assert_eq!(loaded.history.len(), 1);
    }

    #[test]
    fn state_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkflowState::load(dir.path()),
            Err(AgileError::NotInitialized)
        ));
    }

    #[test]
    fn json_field_names() {
        let v = serde_json::to_value(WorkflowState::new()).unwrap();
        for key in [
            "current_phase",
            "progress_percentage",
            "active_sprint",
            "status",
            "blockers",
            "last_activity",
            "next_action",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
        assert_eq!(v["current_phase"], "setup_verification");
    }

    #[test]
    fn advance_requires_approval() {
        let mut s = WorkflowState::new();
        assert!(s.approve().is_err());

        s.request_advance().unwrap();
        assert_eq!(s.status, WorkflowStatus::AwaitingApproval);
        assert!(s.request_advance().is_err());

        let phase = s.approve().unwrap();
        assert_eq!(phase, Phase::StakeholderDiscovery);
        assert_eq!(s.status, WorkflowStatus::Active);
        assert!(s.progress_percentage > 0);
    }

    #[test]
    fn reject_keeps_phase() {
        let mut s = WorkflowState::new();
        s.request_advance().unwrap();
        s.reject().unwrap();
        assert_eq!(s.current_phase, Phase::SetupVerification);
        assert_eq!(s.status, WorkflowStatus::Active);
    }

    #[test]
    fn blocked_cannot_advance() {
        let mut s = WorkflowState::new();
        s.block("waiting on API keys").unwrap();
        s.block("waiting on API keys").unwrap();
        assert_eq!(s.blockers.len(), 1);
        assert!(s.request_advance().is_err());

        s.unblock().unwrap();
        assert!(s.blockers.is_empty());
        s.request_advance().unwrap();
    }

    #[test]
    fn walk_to_completion() {
        let mut s = WorkflowState::new();
        for _ in 0..Phase::all().len() - 1 {
            s.request_advance().unwrap();
            s.approve().unwrap();
        }
        assert_eq!(s.current_phase, Phase::Completed);
        assert_eq!(s.status, WorkflowStatus::Completed);
        assert_eq!(s.progress_percentage, 100);
        assert!(s.request_advance().is_err());
        assert!(s.block("late").is_err());
    }

    #[test]
    fn history_is_capped() {
        let mut s = WorkflowState::new();
        for i in 0..(HISTORY_LIMIT + 5) {
            s.record_dispatch(&format!("cmd-{i}"), "completed");
        }
        assert_eq!(s.history.len(), HISTORY_LIMIT);
        assert_eq!(s.last_dispatch().unwrap().command, format!("cmd-{}", HISTORY_LIMIT + 4));
    }

    #[test]
    fn history_filtered_by_phase() {
        let mut s = WorkflowState::new();
        s.record_dispatch("setup", "completed");
        s.request_advance().unwrap();
        s.approve().unwrap();
        s.record_dispatch("interview", "failed");
        s.record_dispatch("interview", "completed");

        let discovery: Vec<_> = s
            .history_in(Phase::StakeholderDiscovery)
            .map(|e| e.outcome.as_str())
            .collect();
        assert_eq!(discovery, vec!["failed", "completed"]);
        assert_eq!(s.history_in(Phase::SetupVerification).count(), 1);
        assert_eq!(s.history_in(Phase::Research).count(), 0);
    }

    #[test]
    fn phase_parse() {
        assert_eq!(Phase::from_str("research").unwrap(), Phase::Research);
        assert_eq!(
            Phase::from_str("quality-assurance").unwrap(),
            Phase::QualityAssurance
        );
        assert!(matches!(
            Phase::from_str("bogus"),
            Err(AgileError::InvalidPhase(p)) if p == "bogus"
        ));
        assert_eq!(Phase::SetupVerification.progress_percentage(), 0);
        assert_eq!(Phase::Completed.progress_percentage(), 100);
    }
}

//! State machine for one bake run
//!
//! Tracks which stage the orchestrator is in so observers can tell a stuck
//! run from a slow one, and so a stage can never be entered out of order.

use crate::appearance::{AppearanceError, AppearanceResult};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Stages of a bake run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BakeState {
    /// No run in progress
    #[default]
    Idle,
    /// Waiting on the server's answer about cached bakes
    CheckingCache,
    /// Downloading and decoding wearable assets
    ResolvingWearables,
    /// Downloading layer input textures
    DownloadingTextures,
    /// Running the compositor over pending layers
    Compositing,
    /// Sending composited layers to the asset service
    Uploading,
    /// Run finished, whatever the outcome
    Done,
}

impl std::fmt::Display for BakeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BakeState::Idle => write!(f, "Idle"),
            BakeState::CheckingCache => write!(f, "CheckingCache"),
            BakeState::ResolvingWearables => write!(f, "ResolvingWearables"),
            BakeState::DownloadingTextures => write!(f, "DownloadingTextures"),
            BakeState::Compositing => write!(f, "Compositing"),
            BakeState::Uploading => write!(f, "Uploading"),
            BakeState::Done => write!(f, "Done"),
        }
    }
}

#[derive(Debug)]
pub struct BakeStateMachine {
    current_state: BakeState,
    previous_state: Option<BakeState>,
    transition_count: u64,
    state_entered_at: Instant,
}

impl BakeStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: BakeState::Idle,
            previous_state: None,
            transition_count: 0,
            state_entered_at: Instant::now(),
        }
    }

    pub fn current_state(&self) -> BakeState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<BakeState> {
        self.previous_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Check if a state transition is valid
    pub fn can_transition_to(&self, new_state: BakeState) -> bool {
        use BakeState::*;

        match (self.current_state, new_state) {
            // From Idle; the cache check is optional
            (Idle, CheckingCache) => true,
            (Idle, ResolvingWearables) => true,

            (CheckingCache, ResolvingWearables) => true,
            (ResolvingWearables, DownloadingTextures) => true,
            (DownloadingTextures, Compositing) => true,
            (Compositing, Uploading) => true,

            // Any stage may end the run early
            (_, Done) => true,

            (Done, Idle) => true,

            // Self-transitions (layers reach a stage one at a time)
            (state, new_state) if state == new_state => true,

            _ => false,
        }
    }

    pub fn transition_to(&mut self, new_state: BakeState) -> AppearanceResult<()> {
        if !self.can_transition_to(new_state) {
            return Err(AppearanceError::InvalidTransition {
                from: self.current_state,
                to: new_state,
            });
        }
        if self.current_state == new_state {
            return Ok(());
        }

        let old_state = self.current_state;
        debug!(
            "🧍 Bake state: {} -> {} after {:?} (transition #{})",
            old_state,
            new_state,
            self.time_in_current_state(),
            self.transition_count + 1
        );

        self.previous_state = Some(old_state);
        self.current_state = new_state;
        self.transition_count += 1;
        self.state_entered_at = Instant::now();

        if new_state == BakeState::Done {
            info!("🧍 Bake run finished in stage {}", old_state);
        }
        Ok(())
    }

    /// Return to idle, whatever the current state
    pub fn reset(&mut self) {
        if self.current_state != BakeState::Idle {
            self.previous_state = Some(self.current_state);
            self.current_state = BakeState::Idle;
            self.transition_count += 1;
            self.state_entered_at = Instant::now();
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.current_state, BakeState::Idle | BakeState::Done)
    }
}

impl Default for BakeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_run_order() {
        let mut sm = BakeStateMachine::new();
        for state in [
            BakeState::CheckingCache,
            BakeState::ResolvingWearables,
            BakeState::DownloadingTextures,
            BakeState::Compositing,
            BakeState::Uploading,
            BakeState::Uploading,
            BakeState::Done,
        ] {
            sm.transition_to(state).unwrap();
        }
        assert_eq!(sm.current_state(), BakeState::Done);
        assert_eq!(sm.previous_state(), Some(BakeState::Uploading));
        assert_eq!(sm.transition_count(), 6);
        assert!(!sm.is_running());
    }

    #[test]
    fn test_stages_cannot_be_skipped_or_reversed() {
        let mut sm = BakeStateMachine::new();
        assert!(matches!(
            sm.transition_to(BakeState::Compositing),
            Err(AppearanceError::InvalidTransition { from: BakeState::Idle, to: BakeState::Compositing })
        ));

        sm.transition_to(BakeState::ResolvingWearables).unwrap();
        sm.transition_to(BakeState::DownloadingTextures).unwrap();
        assert!(sm.transition_to(BakeState::CheckingCache).is_err());
        assert!(sm.is_running());
    }

    #[test]
    fn test_early_finish_and_reset() {
        let mut sm = BakeStateMachine::new();
        sm.transition_to(BakeState::CheckingCache).unwrap();
        sm.transition_to(BakeState::Done).unwrap();

        sm.reset();
        assert_eq!(sm.current_state(), BakeState::Idle);
        assert!(sm.transition_to(BakeState::CheckingCache).is_ok());
    }
}

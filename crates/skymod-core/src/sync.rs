//! Idempotent application of a desired mute set.

use std::collections::HashSet;
use std::hash::Hash;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    ModerationError, MuteService, PageLimits, PageSource, ResolvedIdentity, list_collection,
};

/// Counts from one synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Distinct identifiers asked for.
    pub requested: usize,
    pub already_satisfied: usize,
    /// Mutations that succeeded, including those before a failure.
    pub newly_applied: usize,
}

impl SyncReport {
    /// Identifiers neither present beforehand nor applied by this run.
    pub fn pending(&self) -> usize {
        self.requested - self.already_satisfied - self.newly_applied
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    ReadingCurrent,
    ComputingDelta,
    Applying,
    Done,
    Failed,
}

impl SyncPhase {
    pub fn can_advance_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, ReadingCurrent)
                | (ReadingCurrent, ComputingDelta)
                | (ReadingCurrent, Failed)
                | (ComputingDelta, Done)
                | (ComputingDelta, Applying)
                | (Applying, Done)
                | (Applying, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

/// Final state of a run. `report` is meaningful even when the run failed.
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub phase: SyncPhase,
    pub error: Option<ModerationError>,
}

impl SyncOutcome {
    pub fn into_result(self) -> Result<SyncReport, ModerationError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.report),
        }
    }
}

/// One run of: read current mutes, subtract, mute the remainder in order.
///
/// Consumed by [`MuteSynchronizer::run`]; a retry needs a fresh value, which
/// re-reads the current set.
pub struct MuteSynchronizer<'a, C: ?Sized, M: ?Sized> {
    current: &'a C,
    mutator: &'a M,
    limits: PageLimits,
    phase: SyncPhase,
    report: SyncReport,
}

impl<'a, C, M> MuteSynchronizer<'a, C, M>
where
    C: PageSource<Item = ResolvedIdentity> + ?Sized,
    M: MuteService + ?Sized,
{
    pub fn new(current: &'a C, mutator: &'a M) -> Self {
        Self {
            current,
            mutator,
            limits: PageLimits::default(),
            phase: SyncPhase::Idle,
            report: SyncReport::default(),
        }
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "{:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "sync phase");
        self.phase = next;
    }

    fn fail(mut self, err: ModerationError) -> SyncOutcome {
        self.advance(SyncPhase::Failed);
        SyncOutcome {
            report: self.report,
            phase: self.phase,
            error: Some(err),
        }
    }

    fn finish(mut self) -> SyncOutcome {
        self.advance(SyncPhase::Done);
        SyncOutcome {
            report: self.report,
            phase: self.phase,
            error: None,
        }
    }

    pub async fn run(mut self, desired: &[String]) -> SyncOutcome {
        self.advance(SyncPhase::ReadingCurrent);
        let current = match list_collection(self.current, self.limits).await {
            Ok(current) => current,
            Err(err) => return self.fail(err),
        };

        self.advance(SyncPhase::ComputingDelta);
        let current: Vec<&str> = current.iter().map(|id| id.did.as_str()).collect();
        let desired: Vec<&str> = desired.iter().map(String::as_str).collect();
        let delta = subtract(&desired, &current);
        self.report.requested = desired.iter().collect::<HashSet<_>>().len();
        self.report.already_satisfied = self.report.requested - delta.len();

        if delta.is_empty() {
            info!(
                "all {} users already muted, nothing more to do",
                self.report.requested
            );
            return self.finish();
        }
        if self.report.already_satisfied > 0 {
            info!(
                "{} of {} users already muted",
                self.report.already_satisfied, self.report.requested
            );
        }

        self.advance(SyncPhase::Applying);
        for did in delta {
            if let Err(source) = self.mutator.mute(did).await {
                let applied = self.report.newly_applied;
                return self.fail(ModerationError::MutationFailure {
                    did: did.to_owned(),
                    applied,
                    source,
                });
            }
            self.report.newly_applied += 1;
            debug!(did, "muted");
        }
        info!("successfully muted {} users", self.report.newly_applied);
        self.finish()
    }
}

/// Brings the mute list up to `desired`, muting only identifiers not
/// already muted.
pub async fn apply_mute_targets<C, M>(
    current: &C,
    mutator: &M,
    desired: &[String],
    limits: PageLimits,
) -> Result<SyncReport, ModerationError>
where
    C: PageSource<Item = ResolvedIdentity> + ?Sized,
    M: MuteService + ?Sized,
{
    MuteSynchronizer::new(current, mutator)
        .with_limits(limits)
        .run(desired)
        .await
        .into_result()
}

/// Items of `desired` absent from `current`, in `desired` order, each once.
pub fn subtract<T>(desired: &[T], current: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let current: HashSet<&T> = current.iter().collect();
    desired
        .iter()
        .filter(|item| !current.contains(item))
        .collect::<IndexSet<&T>>()
        .into_iter()
        .cloned()
        .collect()
}

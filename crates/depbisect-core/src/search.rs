//! The bisection state machine.
//!
//! Standard binary search over the release sequence, driven by a binary
//! property per index instead of a value comparison. The property is
//! assumed monotonic: once a release is Bad, every later release is Bad.
//! The controller does not verify this; a non-monotonic predicate converges
//! on an arbitrary boundary of whatever the predicate describes.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::install::PackageInstaller;
use crate::oracle::{Oracle, Verdict};
use crate::process::{Orchestrator, StageCommand, StepSignal};
use crate::release::Release;

// ---------------------------------------------------------------------------
// Search range
// ---------------------------------------------------------------------------

/// Inclusive index range under search. Only ever narrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRange {
    /// First index in the range.
    pub start: usize,

    /// Last index in the range.
    pub end: usize,
}

impl SearchRange {
    /// Range spanning a sequence of `len` items; `None` when empty.
    pub fn spanning(len: usize) -> Option<SearchRange> {
        if len == 0 {
            None
        } else {
            Some(SearchRange {
                start: 0,
                end: len - 1,
            })
        }
    }

    /// Midpoint index, `floor((start + end) / 2)`.
    pub fn midpoint(&self) -> usize {
        self.start + (self.end - self.start) / 2
    }

    /// Narrow past `mid` according to the verdict; `None` once the range
    /// empties. Bad keeps searching earlier releases, Good later ones.
    pub fn narrowed(self, mid: usize, verdict: Verdict) -> Option<SearchRange> {
        match verdict {
            Verdict::Bad if mid == self.start => None,
            Verdict::Bad => Some(SearchRange {
                start: self.start,
                end: mid - 1,
            }),
            Verdict::Good if mid == self.end => None,
            Verdict::Good => Some(SearchRange {
                start: mid + 1,
                end: self.end,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate evaluation
// ---------------------------------------------------------------------------

/// One full evaluation step for a candidate release.
#[async_trait]
pub trait CandidateEvaluator: Send {
    /// Exercise the candidate and classify it.
    async fn evaluate(&mut self, candidate: &Release) -> Result<Verdict>;
}

/// How a candidate is exercised.
#[derive(Debug, Clone)]
pub enum VerifyMode {
    /// One long-running command; the operator interrupts it to judge.
    Dev {
        /// Shell command line, e.g. `pnpm next dev`.
        command: String,
    },

    /// Build then start, each run to completion.
    BuildStart {
        /// Build stage.
        build: StageCommand,
        /// Start stage.
        start: StageCommand,
    },

    /// No process at all; the operator tests out of band and reports back.
    Manual,
}

/// Production evaluator: install, orchestrate, classify.
pub struct VerifyPipeline {
    installer: PackageInstaller,
    orchestrator: Orchestrator,
    oracle: Oracle,
    mode: VerifyMode,
}

impl VerifyPipeline {
    /// Assemble the per-candidate pipeline.
    pub fn new(
        installer: PackageInstaller,
        orchestrator: Orchestrator,
        oracle: Oracle,
        mode: VerifyMode,
    ) -> Self {
        VerifyPipeline {
            installer,
            orchestrator,
            oracle,
            mode,
        }
    }
}

#[async_trait]
impl CandidateEvaluator for VerifyPipeline {
    async fn evaluate(&mut self, candidate: &Release) -> Result<Verdict> {
        self.installer.install(&candidate.tag).await?;

        let signal = match &self.mode {
            VerifyMode::Manual => StepSignal::Unobserved,
            VerifyMode::Dev { command } => self.orchestrator.run_watched(command).await?,
            VerifyMode::BuildStart { build, start } => {
                self.orchestrator
                    .run_stages(&[build.clone(), start.clone()])
                    .await?
            }
        };

        self.oracle.classify(&candidate.tag, signal).await
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Earliest release judged Bad, if any was.
    pub first_bad: Option<Release>,

    /// Number of candidates evaluated.
    pub steps: u32,
}

/// Drives the bisection over a release sequence.
pub struct Bisector<E> {
    evaluator: E,
    run_id: Uuid,
}

impl<E: CandidateEvaluator> Bisector<E> {
    /// Create a controller around an evaluator.
    pub fn new(evaluator: E) -> Self {
        Bisector {
            evaluator,
            run_id: Uuid::new_v4(),
        }
    }

    /// Search `releases` for the earliest Bad release.
    ///
    /// Evaluates one candidate at a time, strictly in sequence. A Bad
    /// verdict is recorded and narrows the range to earlier releases; a
    /// Good verdict narrows it to later ones. Under a monotonic predicate
    /// the last recorded Bad is the boundary release; if no Bad was ever
    /// recorded the outcome carries no release.
    ///
    /// Any error from the evaluator aborts the search immediately.
    pub async fn run(&mut self, releases: &[Release]) -> Result<SearchOutcome> {
        match SearchRange::spanning(releases.len()) {
            Some(range) => self.run_in(releases, range).await,
            None => Ok(SearchOutcome {
                first_bad: None,
                steps: 0,
            }),
        }
    }

    /// Search within an explicit index range of `releases`.
    ///
    /// The range must lie inside the sequence: `range.end < releases.len()`.
    pub async fn run_in(
        &mut self,
        releases: &[Release],
        mut range: SearchRange,
    ) -> Result<SearchOutcome> {
        debug_assert!(range.end < releases.len());
        let mut outcome = SearchOutcome {
            first_bad: None,
            steps: 0,
        };

        info!(
            run_id = %self.run_id,
            candidates = range.end - range.start + 1,
            "starting bisection"
        );

        loop {
            let mid = range.midpoint();
            let candidate = &releases[mid];
            outcome.steps += 1;

            info!(
                run_id = %self.run_id,
                step = outcome.steps,
                version = %candidate.tag,
                window_start = range.start,
                window_end = range.end,
                "evaluating candidate"
            );

            let verdict = self.evaluator.evaluate(candidate).await?;
            if verdict == Verdict::Bad {
                outcome.first_bad = Some(candidate.clone());
            }
            info!(run_id = %self.run_id, version = %candidate.tag, ?verdict, "verdict applied");

            match range.narrowed(mid, verdict) {
                Some(next) => range = next,
                None => break,
            }
        }

        info!(
            run_id = %self.run_id,
            steps = outcome.steps,
            first_bad = outcome.first_bad.as_ref().map(|r| r.tag.as_str()),
            "bisection converged"
        );
        Ok(outcome)
    }
}

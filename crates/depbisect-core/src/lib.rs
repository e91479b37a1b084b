//! depbisect core: regression bisection over published releases.
//!
//! Finds the earliest release of a dependency that breaks a user-defined
//! check: install a candidate, run the verification command, classify the
//! result (from the process's exit or by asking the operator), and narrow
//! the release window until it empties.
//!
//! The bisection assumes the broken/working property is monotonic over the
//! release sequence: once a release is broken, every later release is.

pub mod error;
pub mod install;
pub mod interrupt;
pub mod oracle;
pub mod process;
pub mod release;
pub mod search;
pub mod telemetry;

pub use error::{BisectError, Result};
pub use install::{InstallerConfig, PackageInstaller};
pub use interrupt::{InterruptAction, InterruptHandle};
pub use oracle::{parse_answer, Oracle, OracleConfig, Verdict};
pub use process::{Orchestrator, StageCommand, StepSignal};
pub use release::{
    clip_to_bounds, parse_release_page, GithubReleases, Release, ReleaseProvider, ReleaseQuery,
};
pub use search::{
    Bisector, CandidateEvaluator, SearchOutcome, SearchRange, VerifyMode, VerifyPipeline,
};
pub use telemetry::init_tracing;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

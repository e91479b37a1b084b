//! Pass/fail classification for a candidate release.
//!
//! Two verdict sources: the verification step's own signal, and the
//! operator. A clean run or a reported stage failure classifies itself; an
//! interrupted run and the pure manual mode route to a yes/no prompt.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::debug;

use crate::error::{BisectError, Result};
use crate::interrupt::InterruptHandle;
use crate::process::StepSignal;

/// Binary classification of a candidate release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No failure observed.
    Good,

    /// Failure observed, or the operator judged the candidate broken.
    Bad,
}

/// Oracle configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Verdict an empty prompt answer maps to.
    pub default_good: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig { default_good: true }
    }
}

/// Produces a verdict from a step's signal, asking the operator whenever
/// the signal alone cannot decide.
pub struct Oracle {
    interrupts: InterruptHandle,
    config: OracleConfig,
    stdin: BufReader<Stdin>,
}

impl Oracle {
    /// Create an oracle reading operator answers from stdin.
    pub fn new(interrupts: InterruptHandle, config: OracleConfig) -> Self {
        Oracle {
            interrupts,
            config,
            stdin: BufReader::new(tokio::io::stdin()),
        }
    }

    /// Classify one candidate from its verification signal.
    pub async fn classify(&mut self, tag: &str, signal: StepSignal) -> Result<Verdict> {
        match signal {
            StepSignal::CleanExit => Ok(Verdict::Good),
            StepSignal::StageFailed => Ok(Verdict::Bad),
            StepSignal::Interrupted | StepSignal::Unobserved => {
                let Oracle {
                    interrupts,
                    config,
                    stdin,
                } = self;
                ask_on(interrupts, config, tag, stdin).await
            }
        }
    }

    /// Ask the operator whether the candidate works, reading the answer
    /// from `input` instead of stdin. Tests inject canned answers here.
    pub async fn ask<R>(&self, tag: &str, input: &mut R) -> Result<Verdict>
    where
        R: AsyncBufRead + Unpin,
    {
        ask_on(&self.interrupts, &self.config, tag, input).await
    }
}

/// Prompt for a verdict. The read races the interrupt the same way a
/// running verification process does.
async fn ask_on<R>(
    interrupts: &InterruptHandle,
    config: &OracleConfig,
    tag: &str,
    input: &mut R,
) -> Result<Verdict>
where
    R: AsyncBufRead + Unpin,
{
    let hint = if config.default_good { "(Y/n)" } else { "(y/N)" };
    print!("Does version {tag} work? {hint}: ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    let guard = interrupts.arm();
    let read = tokio::select! {
        read = input.read_line(&mut answer) => Some(read),
        _ = interrupts.cancelled() => None,
    };
    drop(guard);

    match read {
        Some(read) => {
            read?;
            let verdict = parse_answer(&answer, config.default_good);
            debug!(version = %tag, ?verdict, "operator verdict");
            Ok(verdict)
        }
        None => {
            println!();
            Err(BisectError::Interrupted)
        }
    }
}

/// Map a raw prompt answer onto a verdict.
///
/// Empty input (including EOF) takes the configured default; any answer
/// starting with `n` is negative.
pub fn parse_answer(answer: &str, default_good: bool) -> Verdict {
    let answer = answer.trim().to_ascii_lowercase();
    if answer.is_empty() {
        if default_good {
            Verdict::Good
        } else {
            Verdict::Bad
        }
    } else if answer.starts_with('n') {
        Verdict::Bad
    } else {
        Verdict::Good
    }
}

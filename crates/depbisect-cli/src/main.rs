//! depbisect: find the first broken release of a dependency.
//!
//! Binary-searches a window of published releases: each step pins one
//! candidate release, runs the verification command, and narrows the window
//! from the observed (or operator-reported) verdict.
//!
//! ## Verification modes
//!
//! - `dev`: one long-running command (default `pnpm next dev`); interrupt
//!   it with Ctrl-C when you have judged the candidate, then answer the
//!   prompt. A second Ctrl-C with nothing running aborts the run.
//! - `build-start`: build then start, each run to completion; a failing
//!   stage marks the candidate broken.
//! - `manual`: no command at all; test out of band and answer the prompt.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use depbisect_core::{
    init_tracing, BisectError, Bisector, GithubReleases, InstallerConfig, InterruptHandle, Oracle,
    OracleConfig, Orchestrator, PackageInstaller, ReleaseProvider, ReleaseQuery, StageCommand,
    VerifyMode, VerifyPipeline,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "depbisect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bisect published releases of a dependency to find the first broken one", long_about = None)]
struct Cli {
    /// Verification mode
    #[arg(long, value_enum, default_value = "dev")]
    mode: Mode,

    /// Command to run between version bumps (dev mode)
    #[arg(short = 'C', long, default_value = "pnpm next dev")]
    command: String,

    /// Build stage command (build-start mode)
    #[arg(long, default_value = "pnpm next build")]
    build_command: String,

    /// Start stage command (build-start mode)
    #[arg(long, default_value = "pnpm next start")]
    start_command: String,

    /// Number of last releases to search in
    #[arg(long, default_value_t = 100)]
    per_page: u32,

    /// Oldest release tag to include in the search
    #[arg(long)]
    from: Option<String>,

    /// Newest release tag to include in the search
    #[arg(long)]
    to: Option<String>,

    /// GitHub repository publishing the releases
    #[arg(long, default_value = "vercel/next.js")]
    repo: String,

    /// Dependency to bisect
    #[arg(long, default_value = "next")]
    package: String,

    /// Package manager used for installs
    #[arg(long, default_value = "pnpm")]
    package_manager: String,

    /// Project directory the install and verification commands run in
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Verdict assumed when the prompt is answered with an empty line
    #[arg(long, value_enum, default_value = "yes")]
    default_answer: Answer,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// One long-running dev command, interrupted by the operator
    Dev,
    /// Build then start, each run to completion
    BuildStart,
    /// No command; the operator reports back
    Manual,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Answer {
    /// Empty answer means the candidate works
    Yes,
    /// Empty answer means the candidate is broken
    No,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let interrupts = InterruptHandle::new();
    let listener = interrupts.spawn_listener();

    let result = run(cli, interrupts).await;
    listener.abort();

    match result {
        Ok(()) => Ok(()),
        // An operator abort ends the run quietly with no result message.
        Err(err) if err.downcast_ref::<BisectError>().is_some_and(is_abort) => Ok(()),
        Err(err) => Err(err),
    }
}

fn is_abort(err: &BisectError) -> bool {
    matches!(err, BisectError::Interrupted)
}

async fn run(cli: Cli, interrupts: InterruptHandle) -> Result<()> {
    let provider = GithubReleases::new(&cli.repo);
    let query = ReleaseQuery {
        per_page: cli.per_page,
        from: cli.from.clone(),
        to: cli.to.clone(),
    };
    let releases = provider
        .releases(&query)
        .await
        .context("failed to fetch the release window")?;

    if releases.is_empty() {
        println!("No releases to search in.");
        return Ok(());
    }

    println!("Let's find the first broken release.");
    println!(
        "Searching in {} releases, between {} and {}",
        releases.len(),
        releases[0],
        releases[releases.len() - 1]
    );

    let mode = match cli.mode {
        Mode::Dev => VerifyMode::Dev {
            command: cli.command.clone(),
        },
        Mode::BuildStart => VerifyMode::BuildStart {
            build: StageCommand::new("build", &cli.build_command),
            start: StageCommand::new("start", &cli.start_command),
        },
        Mode::Manual => VerifyMode::Manual,
    };

    let installer = PackageInstaller::new(InstallerConfig {
        manager: cli.package_manager.clone(),
        package: cli.package.clone(),
        project_dir: Some(cli.project.clone()),
    });
    let orchestrator = Orchestrator::new(interrupts.clone()).with_project_dir(&cli.project);
    let oracle = Oracle::new(
        interrupts.clone(),
        OracleConfig {
            default_good: matches!(cli.default_answer, Answer::Yes),
        },
    );

    let pipeline = VerifyPipeline::new(installer, orchestrator, oracle, mode);
    let mut bisector = Bisector::new(pipeline);
    let outcome = bisector.run(&releases).await?;

    match outcome.first_bad {
        Some(release) => println!("Success! Found the first broken release: {release}"),
        None => println!("No broken release found in the searched range."),
    }

    Ok(())
}

//! Flakefinder - flaky test detection CLI
//!
//! ## Commands
//!
//! - `detect`: run a pytest target repeatedly and report flaky tests with
//!   root causes and repair suggestions
//! - `ci github`: mine GitHub Actions history for flaky tests
//! - `ci gitlab`: mine GitLab CI history for flaky tests

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::Level;

use flakefinder_ci::{
    flaky_tests, import_history, CiAggregate, CiHistorySource, GitHubActions, GitLabCi,
};
use flakefinder_core::{
    detector::resolve_test_file, init_tracing, suggest_repairs, DetectorConfig, FlakyDetector,
    PythonSpanResolver, RootCause, RootCauseClassifier, TestAggregate, TestStatus,
};

#[derive(Parser)]
#[command(name = "flakefinder")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated detection and analysis of flaky tests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect flaky tests by running them multiple times
    Detect {
        /// Path to test file or directory
        test_path: PathBuf,

        /// Number of times to run each test
        #[arg(short = 'n', long, default_value = "10")]
        runs: u32,

        /// Skip root cause analysis
        #[arg(long)]
        no_analyze: bool,

        /// Skip repair suggestions
        #[arg(long)]
        no_suggest: bool,
    },

    /// Analyze historical CI executions for flakiness
    Ci {
        #[command(subcommand)]
        action: CiAction,
    },
}

#[derive(Subcommand)]
enum CiAction {
    /// Mine GitHub Actions workflow history
    Github {
        /// Repository in owner/repo form
        repo: String,

        /// Personal access token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Workflow name filter (substring, case-insensitive)
        #[arg(short, long, default_value = "tests")]
        workflow: String,

        /// Lookback window in days
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Branch to analyze
        #[arg(short, long, default_value = "main")]
        branch: String,

        /// Minimum observed runs for a test to be reported
        #[arg(long, default_value = "3")]
        min_runs: u32,
    },

    /// Mine GitLab CI pipeline history
    Gitlab {
        /// Project ID or URL-encoded namespace/project
        project: String,

        /// Personal access token
        #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
        token: String,

        /// GitLab instance URL
        #[arg(long, default_value = "https://gitlab.com")]
        instance: String,

        /// Lookback window in days
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Ref to analyze
        #[arg(short, long, default_value = "main")]
        r#ref: String,

        /// Minimum observed runs for a test to be reported
        #[arg(long, default_value = "3")]
        min_runs: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Detect {
            test_path,
            runs,
            no_analyze,
            no_suggest,
        } => cmd_detect(&test_path, runs, cli.verbose, !no_analyze, !no_suggest).await,
        Commands::Ci { action } => match action {
            CiAction::Github {
                repo,
                token,
                workflow,
                days,
                branch,
                min_runs,
            } => {
                let source = GitHubActions::new(&repo, &token, &workflow);
                cmd_ci(&source, days, &branch, min_runs).await
            }
            CiAction::Gitlab {
                project,
                token,
                instance,
                days,
                r#ref,
                min_runs,
            } => {
                let source = GitLabCi::new(&project, &token).with_instance_url(&instance);
                cmd_ci(&source, days, &r#ref, min_runs).await
            }
        },
    }
}

async fn cmd_detect(
    test_path: &Path,
    runs: u32,
    verbose: bool,
    analyze: bool,
    suggest: bool,
) -> Result<()> {
    println!("Flakefinder: running tests {runs} times to detect flakiness...");

    let config = DetectorConfig::new(test_path, runs).with_verbose(verbose);
    let mut detector = FlakyDetector::new(config).context("Failed to start detection")?;
    detector
        .run_detection()
        .await
        .context("Detection session failed")?;

    let flaky = detector.flaky_tests();
    let stable = detector.stable_tests();
    let total = flaky.len() + stable.len();

    println!();
    println!("Detection Summary");
    println!("  Total tests:   {total}");
    println!("  Runs per test: {runs}");
    println!("  Stable tests:  {}", stable.len());
    println!("  Flaky tests:   {}", flaky.len());
    if total > 0 {
        let rate = flaky.len() as f64 / total as f64 * 100.0;
        println!("  Flakiness rate: {rate:.1}%");
    }

    if flaky.is_empty() {
        println!("\nNo flaky tests detected. All tests are stable.");
        return Ok(());
    }

    println!("\n{} flaky test(s) detected", flaky.len());

    let runner_cwd = std::env::current_dir().context("Cannot determine working directory")?;
    let classifier = RootCauseClassifier::new();
    let resolver = PythonSpanResolver::new();
    let mut causes_per_test: HashMap<String, Vec<RootCause>> = HashMap::new();

    for (i, test) in flaky.iter().enumerate() {
        println!("\n{}. {}", i + 1, test.test_function);
        println!("   File: {}", test.test_file);
        println!("   Flakiness score: {:.1}%", test.flakiness_score() * 100.0);
        println!("   Pattern: {}", test.failure_pattern().as_str());
        println!(
            "   Results: {} passed / {} failed / {} errored / {} skipped",
            test.history.pass_count,
            test.history.fail_count,
            test.history.error_count,
            test.history.skip_count
        );
        println!("   Sequence: {}", render_sequence(test));

        if !analyze {
            continue;
        }

        let test_file = resolve_test_file(&runner_cwd, &test.test_file);
        let causes = classifier.classify_function(&resolver, &test_file, &test.test_function);

        println!("   Root causes:");
        for cause in &causes {
            println!(
                "   - {} (confidence: {:.0}%)",
                cause.kind.as_str(),
                cause.confidence * 100.0
            );
            println!("     {}", cause.description);
            if !cause.evidence.is_empty() {
                let lines: Vec<String> =
                    cause.evidence.iter().map(|e| e.line.to_string()).collect();
                println!("     Lines: {}", lines.join(", "));
            }

            if suggest {
                let top = suggest_repairs(std::slice::from_ref(cause));
                if !top.is_empty() {
                    println!("     Suggested fixes:");
                    for (j, s) in top.iter().take(2).enumerate() {
                        println!("     {}. {}", j + 1, s.title);
                    }
                }
            }
        }

        causes_per_test.insert(test.test_id.clone(), causes);
    }

    if suggest && analyze {
        print_detailed_suggestions(&flaky, &causes_per_test);
    }

    Ok(())
}

fn print_detailed_suggestions(
    flaky: &[&TestAggregate],
    causes_per_test: &HashMap<String, Vec<RootCause>>,
) {
    println!("\n{}", "=".repeat(60));
    println!("Detailed Repair Suggestions\n");

    for test in flaky {
        let Some(causes) = causes_per_test.get(&test.test_id) else {
            continue;
        };

        let suggestions = suggest_repairs(causes);
        if suggestions.is_empty() {
            continue;
        }

        println!("{}", test.test_function);
        for (j, s) in suggestions.iter().enumerate() {
            println!("\nFix #{} (priority {}): {}", j + 1, s.priority, s.title);
            println!("{}", s.description);
            println!("---");
            println!("{}", s.example);
            println!("---");
        }
        println!();
    }
}

/// Compact per-run outcome glyphs, truncated after 20 entries.
fn render_sequence(test: &TestAggregate) -> String {
    let mut symbols: Vec<&str> = test
        .history
        .outcomes
        .iter()
        .take(20)
        .map(|o| match o {
            TestStatus::Passed => "✓",
            TestStatus::Failed | TestStatus::Error => "✗",
            TestStatus::Skipped => "⊘",
        })
        .collect();

    if test.history.outcomes.len() > 20 {
        symbols.push("...");
    }

    symbols.join(" ")
}

async fn cmd_ci<S: CiHistorySource>(
    source: &S,
    days: i64,
    git_ref: &str,
    min_runs: u32,
) -> Result<()> {
    println!(
        "Importing CI history ({}, last {days} days, ref {git_ref})...",
        source.name()
    );

    let results = import_history(source, days, git_ref).await;
    let flaky = flaky_tests(&results, min_runs);

    println!();
    println!("Tests observed: {}", results.len());
    println!("Flaky tests (>= {min_runs} runs): {}", flaky.len());

    if flaky.is_empty() {
        println!("\nNo flaky tests found in CI history.");
        return Ok(());
    }

    for (i, test) in flaky.iter().enumerate() {
        print_ci_aggregate(i + 1, test);
    }

    Ok(())
}

fn print_ci_aggregate(index: usize, test: &CiAggregate) {
    println!("\n{index}. {}", test.test_name);
    println!("   Flakiness score: {:.1}%", test.flakiness_score() * 100.0);
    println!("   Failure rate: {:.1}%", test.failure_rate() * 100.0);
    println!(
        "   Runs: {} ({} passed / {} failed / {} errored / {} skipped)",
        test.total_runs(),
        test.history.pass_count,
        test.history.fail_count,
        test.history.error_count,
        test.history.skip_count
    );
    let branches: Vec<&str> = test.branches.iter().map(String::as_str).collect();
    println!("   Branches: {}", branches.join(", "));
    if let Some(latest) = test.runs.last() {
        println!(
            "   Last seen: run #{} ({}) at {}",
            latest.run_number,
            short_sha(&latest.commit_sha),
            latest.timestamp.format("%Y-%m-%d %H:%M UTC")
        );
    }
}

/// First 12 characters of a commit sha; tolerates short or non-ASCII input.
fn short_sha(sha: &str) -> String {
    sha.chars().take(12).collect()
}

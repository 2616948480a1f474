//! Command line of the `ftp_integration` binary.
//!
//! `cargo test` hands every test target the same libtest arguments, so the
//! binary understands the common ones: a positional name filter, `--skip`,
//! `--exact` and `--list`. Flags that tune libtest's own scheduling or
//! output (`--test-threads`, `--nocapture`, `--color`, ...) are accepted and
//! have no effect here.

use clap::Parser;
use itest_harness::Suite;
use tracing::Level;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ftp_integration")]
#[command(about = "End-to-end FTP suite against a provisioned container", long_about = None)]
pub struct SuiteArgs {
    /// Run only cases whose name contains this string
    pub filter: Option<String>,

    /// Skip cases whose name contains this string (repeatable)
    #[arg(long, value_name = "NAME")]
    pub skip: Vec<String>,

    /// Match the filter and `--skip` against whole case names
    #[arg(long)]
    pub exact: bool,

    /// Print the selected case names and exit
    #[arg(long)]
    pub list: bool,

    /// Only print the final result line
    #[arg(short, long)]
    pub quiet: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Ignored: cases within a stage always run concurrently
    #[arg(long, value_name = "N")]
    pub test_threads: Option<usize>,

    /// Ignored: case output is never captured
    #[arg(long)]
    pub nocapture: bool,

    /// Ignored
    #[arg(long)]
    pub show_output: bool,

    /// Ignored
    #[arg(long, value_name = "WHEN")]
    pub color: Option<String>,

    /// Ignored
    #[arg(long, value_name = "FMT")]
    pub format: Option<String>,
}

impl SuiteArgs {
    /// Narrow `suite` to the cases selected on the command line.
    pub fn select<R>(&self, suite: Suite<R>) -> Suite<R> {
        let suite = match &self.filter {
            Some(filter) => suite.retain_cases(|name| self.matches(name, filter)),
            None => suite,
        };
        self.skip.iter().fold(suite, |suite, skip| {
            suite.retain_cases(|name| !self.matches(name, skip))
        })
    }

    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    fn matches(&self, name: &str, pattern: &str) -> bool {
        if self.exact {
            name == pattern
        } else {
            name.contains(pattern)
        }
    }
}

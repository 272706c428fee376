//! Command-line interface definitions for the blog rewriter.
//!
//! Every option can be given as a flag; credentials can also come from the
//! environment.

use crate::config::Credentials;
use crate::pipeline::Job;
use clap::{Parser, Subcommand};

/// Command-line arguments for the blog rewriter.
///
/// # Examples
///
/// ```sh
/// # Store the oldest listing articles
/// blog_rewriter ingest
///
/// # Rewrite the newest unprocessed article, without a record store
/// GROQ_API_KEY=... blog_rewriter --dry-run rewrite
///
/// # Both jobs with a config file and per-job reports
/// blog_rewriter -c config.yaml --report-dir ./reports all
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Optional path to config.yaml file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Record store API root (overrides the config file)
    #[arg(long, env = "STORE_URL", global = true)]
    pub store_url: Option<String>,

    /// Use an in-memory record store instead of the REST service
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory for per-job JSON reports
    #[arg(short, long, global = true)]
    pub report_dir: Option<String>,

    /// Cancel a job that runs longer than this many seconds
    #[arg(long, global = true)]
    pub job_timeout: Option<u64>,

    /// SerpApi key
    #[arg(long, env = "SERPAPI_KEY", hide_env_values = true, global = true)]
    pub serpapi_key: Option<String>,

    /// Google Custom Search API key
    #[arg(long, env = "GOOGLE_SEARCH_API_KEY", hide_env_values = true, global = true)]
    pub google_search_api_key: Option<String>,

    /// Google Custom Search engine id
    #[arg(long, env = "GOOGLE_SEARCH_ENGINE_ID", global = true)]
    pub google_search_engine_id: Option<String>,

    /// Rewrite service API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true, global = true)]
    pub groq_api_key: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Collect the oldest listing articles and store them
    Ingest,
    /// Rewrite the newest unprocessed article against its competitors
    Rewrite,
    /// Ingest, then rewrite
    All,
}

impl Command {
    /// Jobs to run, in order.
    pub fn jobs(&self) -> &'static [Job] {
        match self {
            Command::Ingest => &[Job::Ingest],
            Command::Rewrite => &[Job::Rewrite],
            Command::All => &[Job::Ingest, Job::Rewrite],
        }
    }
}

impl Cli {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            serpapi_key: self.serpapi_key.clone(),
            google_search_api_key: self.google_search_api_key.clone(),
            google_search_engine_id: self.google_search_engine_id.clone(),
            rewrite_api_key: self.groq_api_key.clone(),
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "blog_rewriter",
            "--config",
            "./config.yaml",
            "--report-dir",
            "./reports",
            "rewrite",
        ]);

        assert_eq!(cli.command, Command::Rewrite);
        assert_eq!(cli.config.as_deref(), Some("./config.yaml"));
        assert_eq!(cli.report_dir.as_deref(), Some("./reports"));
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_cli_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "blog_rewriter",
            "all",
            "--dry-run",
            "-c",
            "/tmp/config.yaml",
            "--job-timeout",
            "600",
        ]);

        assert_eq!(cli.command.jobs(), &[Job::Ingest, Job::Rewrite]);
        assert!(cli.dry_run);
        assert_eq!(cli.config.as_deref(), Some("/tmp/config.yaml"));
        assert_eq!(cli.job_timeout, Some(600));
    }

    #[test]
    fn test_blank_credentials_are_unset() {
        let cli = Cli::parse_from([
            "blog_rewriter",
            "ingest",
            "--serpapi-key",
            "  ",
            "--groq-api-key",
            "gsk_test",
        ]);
        let creds = cli.credentials();
        assert!(creds.serpapi_key.is_none());
        assert_eq!(creds.rewrite_api_key.as_deref(), Some("gsk_test"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["blog_rewriter"]).is_err());
    }
}

//! Jobscout CLI - automated job search
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, wiring the services and handling top-level errors.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use colored::Colorize;
use jobscout::agent::GeminiAgent;
use jobscout::mailer::{ConsoleMailer, GmailMailer};
use jobscout::oauth::{ClientSecrets, ConsentFlow};
use jobscout::scraper::HttpFetcher;
use jobscout::search::SerpApiClient;
use jobscout::{Collaborators, Config, JobSearchWorkflow, Mailer, WorkflowState};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(author, version, about = "Find, rank and email job postings matching a plain-language request", long_about = None)]
struct Cli {
    /// Config file (defaults to ./jobscout.toml, then ~/.config/jobscout/jobscout.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the search pipeline
    Run {
        /// What you are looking for; the configured default request is used if omitted
        request: Option<String>,
        /// Print the email instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Authorize Gmail sending once and save the token to `email.token_path`
    Auth,
    /// Print the effective configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "jobscout", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&cli)?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Some(Commands::Run { request, dry_run }) => run(&config, request.as_deref(), dry_run).await,
        Some(Commands::Auth) => authorize(&config).await,
        Some(Commands::Config) => {
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
        Some(Commands::Completions { .. }) => Ok(()),
        // Default: run with the configured request
        None => run(&config, None, false).await,
    }
}

async fn run(config: &Config, request: Option<&str>, dry_run: bool) -> anyhow::Result<()> {
    let workflow_config = config.workflow_config()?;

    let mailer: Arc<dyn Mailer> = if dry_run {
        Arc::new(ConsoleMailer)
    } else {
        Arc::new(GmailMailer::new(&config.email.token_path)?)
    };
    let collaborators = Collaborators {
        agent: Arc::new(GeminiAgent::from_config(config)?),
        search: Arc::new(SerpApiClient::from_config(config)?),
        fetcher: Arc::new(HttpFetcher::new()?),
        mailer,
    };

    let workflow = JobSearchWorkflow::new(collaborators, workflow_config, config.prompts.clone());
    println!("{}", "Searching for jobs...".dimmed());
    let state = workflow.run(request).await.context("job search failed")?;

    print_results(&state, dry_run);
    Ok(())
}

async fn authorize(config: &Config) -> anyhow::Result<()> {
    let secrets = ClientSecrets::load(&config.email.client_secret_path)?;
    let flow = ConsentFlow::new(secrets)?;
    let pending = flow.start().await?;

    println!("{}", "Open this URL and allow jobscout to send mail for you:".bold());
    println!("\n  {}\n", pending.url().as_str().underline());
    println!("{}", "Waiting for the browser to come back...".dimmed());

    let token = flow.finish(pending).await.context("Gmail authorization failed")?;
    token.save(&config.email.token_path)?;
    println!(
        "✅ {} {}",
        "Token saved to".green(),
        config.email.token_path.display()
    );
    Ok(())
}

fn print_results(state: &WorkflowState, dry_run: bool) {
    println!("\n🔎 {} {}", "Query:".bold(), state.optimized_query);
    println!(
        "   {} URLs found, {} selected\n",
        state.urls.len(),
        state.ranked_posts.len()
    );

    for (rank, post) in state.ranked_posts.iter().enumerate() {
        println!("{}. {}", rank + 1, post.summary);
        println!("   {}\n", post.url.underline());
    }

    if !dry_run {
        println!("✅ {}", "Results emailed.".green());
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match cli.verbose {
        0 => "jobscout=info",
        1 => "jobscout=debug",
        _ => "jobscout=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = fmt().with_env_filter(env_filter).with_target(false);
    match (&cli.log_file, cli.log_format) {
        (Some(path), format) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Text => builder.init(),
                LogFormat::Json => builder.json().init(),
            }
        }
        (None, LogFormat::Text) => builder.with_writer(std::io::stderr).init(),
        (None, LogFormat::Json) => builder.json().with_writer(std::io::stderr).init(),
    }
    Ok(())
}

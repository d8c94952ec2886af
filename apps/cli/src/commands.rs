//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use contentpub_api::{ApiState, build_router};
use contentpub_auth::{Authenticator, issue_session_token};
use contentpub_core::{ContentLayout, ProgressReporter, Publisher};
use contentpub_shared::{
    AppConfig, AuthSettings, Draft, GitHubSettings, ImageUpload, LoginSettings, PublishOutcome,
    PublishRequest, Section, config_file_path, init_config, init_config_at, load_config,
    load_config_from,
};
use contentpub_store::{GitHubConnector, TokenResolver};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// contentpub: publish structured content to a Git-hosted site.
#[derive(Parser)]
#[command(
    name = "contentpub",
    version,
    about = "Commit content items to a Git-hosted static site and keep section manifests in sync.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.contentpub/contentpub.toml).
    #[arg(long, global = true, env = "CONTENTPUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP publish API.
    Serve {
        /// Address to listen on (overrides server.bind).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Publish a draft directly, using the configured store credential.
    Publish {
        /// Section: news, events, or projects.
        #[arg(long)]
        section: Section,

        /// Slug; becomes the content filename stem.
        #[arg(long)]
        slug: String,

        /// Path to the draft JSON document.
        #[arg(long)]
        draft: PathBuf,

        /// Image file to upload alongside the draft.
        #[arg(long)]
        image: Option<PathBuf>,

        /// Overwrite existing content and replace the manifest entry.
        #[arg(long)]
        force: bool,

        /// Commit message (defaults to "Add <section> entry <slug>").
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Session token operations.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Token subcommands.
#[derive(Subcommand)]
pub(crate) enum TokenAction {
    /// Print a session token signed with the configured session secret.
    Issue {
        /// Subject recorded in the token.
        #[arg(long)]
        sub: String,

        /// Lifetime in seconds (defaults to auth.session_ttl_secs).
        #[arg(long)]
        ttl: Option<u64>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "contentpub=info,tower_http=info",
        1 => "contentpub=debug,tower_http=debug",
        _ => "contentpub=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Serve { bind } => cmd_serve(config_path, bind.as_deref()).await,
        Command::Publish {
            section,
            slug,
            draft,
            image,
            force,
            message,
        } => {
            if slug.trim().is_empty() {
                return Err(eyre!("--slug must not be empty"));
            }
            let request = PublishRequest {
                section,
                slug,
                draft: read_draft(&draft)?,
                image: image.as_deref().map(read_image).transpose()?,
                force,
                commit_message: message,
            };
            cmd_publish(config_path, request).await
        }
        Command::Token { action } => match action {
            TokenAction::Issue { sub, ttl } => cmd_token_issue(config_path, &sub, ttl),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Assemble a publisher backed by the configured GitHub repository.
async fn build_publisher(config: &AppConfig) -> Result<Publisher> {
    let github = GitHubSettings::from_config(config)?;
    let resolver = TokenResolver::from_settings(&github).await;
    info!(
        repo = %format!("{}/{}", github.owner, github.repo),
        branch = %github.branch,
        "using GitHub content store"
    );

    Ok(Publisher::new(
        Arc::new(GitHubConnector::new(github, resolver)),
        Authenticator::new(AuthSettings::from_config(config)),
        ContentLayout::from_config(&config.content),
    ))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config_path: Option<&Path>, bind: Option<&str>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let publisher = build_publisher(&config).await?;
    if !publisher.authenticator().is_configured() {
        tracing::warn!("no session or shared secret configured; every publish will be rejected");
    }

    let state = Arc::new(ApiState {
        publisher,
        login: LoginSettings::from_config(&config),
    });
    let app = build_router(state, &config.server.allowed_origin)?;

    let addr = bind.unwrap_or(&config.server.bind);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;
    info!(addr = %listener.local_addr()?, "publish API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn cmd_publish(config_path: Option<&Path>, request: PublishRequest) -> Result<()> {
    let config = resolve_config(config_path)?;
    let publisher = build_publisher(&config).await?;

    info!(
        section = %request.section,
        slug = %request.slug,
        force = request.force,
        "publishing from command line"
    );

    let reporter = CliProgress::new();
    let result = publisher.publish(&request, &reporter).await;
    reporter.spinner.finish_and_clear();
    let outcome = result?;

    let section = request.section.config();
    let layout = publisher.layout();
    println!();
    println!("  Published {} entry '{}'", section.manifest_label, request.slug);
    println!("  Content:  {}", layout.content_path(&section, &request.slug)?);
    println!(
        "  Manifest: {} ({})",
        layout.manifest_path(&section),
        if outcome.manifest_updated { "updated" } else { "unchanged" }
    );
    println!();
    Ok(())
}

fn cmd_token_issue(config_path: Option<&Path>, sub: &str, ttl: Option<u64>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let login = LoginSettings::from_config(&config);
    let secret = login.session_secret.as_deref().ok_or_else(|| {
        eyre!(
            "session secret not configured (set {})",
            config.auth.session_secret_env
        )
    })?;
    let ttl = ttl.unwrap_or(login.effective_ttl_secs());

    let issued = issue_session_token(secret, sub, chrono::Utc::now().timestamp(), ttl);
    info!(sub, expires_at = issued.expires_at, "issued session token");
    println!("{}", issued.token);
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            init_config_at(path)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let source = match config_path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    println!("# {}", source.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Local inputs
// ---------------------------------------------------------------------------

fn read_draft(path: &Path) -> Result<Draft> {
    let bytes = std::fs::read(path).map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
    match serde_json::from_slice(&bytes)? {
        Value::Object(map) if !map.is_empty() => Ok(map),
        _ => Err(eyre!(
            "{} must contain a non-empty JSON object",
            path.display()
        )),
    }
}

fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path).map_err(|e| eyre!("cannot read {}: {e}", path.display()))?;
    if bytes.is_empty() {
        return Err(eyre!("{} is empty", path.display()));
    }
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| eyre!("image path has no usable file name: {}", path.display()))?
        .to_string();
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    };
    Ok(ImageUpload {
        filename,
        content_type: content_type.to_string(),
        bytes,
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_committed(&self, path: &str) {
        self.spinner.println(format!("  committed {path}"));
    }

    fn done(&self, _outcome: &PublishOutcome) {
        self.spinner.finish_and_clear();
    }
}

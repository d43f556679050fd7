use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use shortfeed::api::{build_http_client, ApiClient, CommentSource};
use shortfeed::app::{App, AppEvent};
use shortfeed::config::Config;
use shortfeed::session::SessionState;
use shortfeed::upload::{publish, HttpBlobStore, UploadRequest};
use shortfeed::util::{strip_control_chars, validate_base_url, validate_endpoint_url};

/// Get the config directory path (~/.config/shortfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("shortfeed"))
}

/// Default log file for the TUI (~/.local/state/shortfeed/shortfeed.log)
fn default_log_file() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("state")
        .join("shortfeed")
        .join("shortfeed.log"))
}

/// Create `dir` if missing and restrict it to the current user.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    // SEC-007: Set directory permissions on Unix (user-only access)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(dir, perms) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Failed to set directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read directory metadata");
            }
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "shortfeed", about = "Terminal client for a short-form video feed")]
struct Args {
    /// Config file (default: ~/.config/shortfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Service origin, overrides `base_url` from the config file
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Where the TUI writes its log
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a video file and publish it to the feed
    Upload {
        /// Video file to upload
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Print the newest comments and the comment count of a video
    Comments {
        video_id: String,
    },
}

/// Logs go to a file while the TUI owns the terminal, to stderr otherwise.
fn init_tracing(args: &Args) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    if args.command.is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    let path = match &args.log_file {
        Some(path) => path.clone(),
        None => default_log_file()?,
    };
    if let Some(dir) = path.parent() {
        ensure_private_dir(dir)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config_dir = get_config_dir()?;
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            ensure_private_dir(&config_dir)?;
            config_dir.join("config.toml")
        }
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    tracing::debug!(?config, "Effective configuration");

    let base = validate_base_url(&config.base_url)
        .with_context(|| format!("Invalid base_url '{}'", config.base_url))?;
    let timeout = config.request_timeout();
    let http = build_http_client(timeout).context("Failed to build HTTP client")?;
    let api = ApiClient::new(http.clone(), base.clone(), config.session_token(), timeout);

    match args.command {
        Some(Command::Upload {
            file,
            title,
            description,
        }) => {
            let session = resolve_session(&api, base).await?;
            let endpoint = validate_endpoint_url(&config.storage_endpoint())
                .context("Invalid storage_url")?;
            let blob = HttpBlobStore::new(http, endpoint, config.session_token(), timeout);
            let request = UploadRequest {
                file,
                title,
                description,
            };
            let record = publish(&blob, &api, &session, &request)
                .await
                .context("Upload failed")?;
            println!("Published \"{}\" ({})", record.title, record.uid);
            println!("{}", record.video_url);
            Ok(())
        }
        Some(Command::Comments { video_id }) => {
            print_comments(&api, &video_id, config.comment_take()).await
        }
        None => {
            let session = SessionState::signed_out(base);
            let (media_tx, media_rx) = mpsc::unbounded_channel();
            let mut app = App::new(config, api, session, media_tx);

            // Create event channel for background tasks
            let (event_tx, event_rx) = mpsc::channel::<AppEvent>(64);

            shortfeed::ui::run(&mut app, event_tx, event_rx, media_rx).await?;

            println!("Goodbye!");
            Ok(())
        }
    }
}

/// Looks up the viewer behind the configured session token.
async fn resolve_session(api: &ApiClient, base: url::Url) -> Result<SessionState> {
    if !api.has_session() {
        return Ok(SessionState::signed_out(base));
    }
    let viewer = api
        .fetch_viewer()
        .await
        .context("Failed to resolve session")?;
    let mut session = SessionState::signed_out(base);
    session.set_viewer(viewer);
    Ok(session)
}

async fn print_comments(api: &ApiClient, video_id: &str, take: u32) -> Result<()> {
    let (page, count) = futures::join!(
        api.list_comments(video_id.to_string(), None, take),
        api.comment_count(video_id.to_string()),
    );
    let page = page.context("Failed to load comments")?;
    let count = count.context("Failed to load comment count")?;

    println!("{} comment(s)", count);
    for comment in &page.items {
        println!(
            "- {} ({}): {}",
            strip_control_chars(comment.user.display_name()),
            comment.created_at.format("%Y-%m-%d %H:%M"),
            strip_control_chars(&comment.body)
        );
    }
    if page.next_cursor.is_some() {
        println!("...");
    }
    Ok(())
}

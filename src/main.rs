use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use truenews::ai::GeminiClient;
use truenews::app::{App, AppError};
use truenews::audio::{AudioSink, NarrationOutcome, Narrator, TimedSink, WavSink};
use truenews::auth::AuthState;
use truenews::config::Config;
use truenews::editor::ArticleDraft;
use truenews::model::{Category, Role};
use truenews::render;
use truenews::storage::{Database, DatabaseError, LocalStore};
use truenews::sync::{ArticleSync, Backend, RemoteWrite, WriteReport};

/// Get the config directory path (~/.config/truenews/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("truenews"))
}

#[derive(Parser, Debug)]
#[command(name = "truenews", about = "News site with comments, AI-assisted authoring and narration")]
struct Args {
    /// Reset the local database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Config file (defaults to ~/.config/truenews/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output width in columns
    #[arg(long, default_value_t = render::DEFAULT_WIDTH)]
    width: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the home page: breaking ticker, hero and article list
    List {
        /// Category slug (politics, sports, ...) or Hebrew label
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one article with its comments
    Show { id: String },
    /// Keep the home page on screen, redrawing on every change
    Watch {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Publish a new article (admin)
    Publish {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "politics")]
        category: Category,
        #[arg(long)]
        image: Option<String>,
        /// Mark as breaking for this many hours (1-24)
        #[arg(long, value_name = "HOURS")]
        breaking: Option<u32>,
        /// Generate body, subtitle and image from the title
        #[arg(long)]
        ai: bool,
    },
    /// Suggest a headline for a body of text
    SuggestTitle {
        #[arg(long)]
        content: String,
    },
    /// Delete an article (admin)
    Remove { id: String },
    /// Comment on an article
    Comment { id: String, text: String },
    /// Delete a comment (admin or the comment's author)
    DeleteComment { article: String, comment: String },
    /// Narrate an article
    Listen {
        id: String,
        /// Write the narration to a WAV file instead of timing playback
        #[arg(long, value_name = "FILE")]
        wav: Option<PathBuf>,
    },
    Register {
        username: String,
        #[arg(long, env = "TRUENEWS_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        admin_code: Option<String>,
    },
    Login {
        username: String,
        #[arg(long, env = "TRUENEWS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
}

fn print_report(report: &WriteReport) {
    match &report.remote {
        RemoteWrite::Skipped => tracing::debug!("Saved locally (local-only mode)"),
        RemoteWrite::Written { id } => tracing::debug!(id = %id, "Saved remotely"),
        RemoteWrite::Failed { reason } => {
            eprintln!("Warning: saved locally only, remote write failed: {reason}");
        }
    }
}

async fn open_store(db_path: &std::path::Path) -> Result<LocalStore> {
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of truenews appears to be running. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };
    Ok(LocalStore::new(db))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access to the directory holding the database and secrets
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();
    tracing::debug!(config = ?config, "Configuration resolved");

    let db_path = config_dir.join("news.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }
    let store = open_store(&db_path).await?;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("Failed to build HTTP client")?;
    let timeout = config.request_timeout();

    let backend = Backend::from_config(&config.remote, client.clone(), timeout);
    let ai = GeminiClient::new(config.gemini_key(), &config.ai_base_url, client, timeout);
    let sink: Arc<dyn AudioSink> = match &args.command {
        Command::Listen { wav: Some(path), .. } => Arc::new(WavSink::new(path)),
        _ => Arc::new(TimedSink),
    };

    let mut app = App::new(
        ArticleSync::new(backend, store.clone()),
        AuthState::stored(store, config.admin_code.clone()),
        ai.clone(),
        Narrator::new(ai, sink),
    );
    app.restore_session().await;

    match run(&mut app, args.command, args.width).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast_ref::<AppError>() {
            // User-facing failures get the message only
            Some(app_err) => {
                eprintln!("{app_err}");
                std::process::exit(1);
            }
            None => Err(e),
        },
    }
}

async fn run(app: &mut App, command: Command, width: usize) -> Result<()> {
    match command {
        Command::List { category, search } => {
            app.load().await;
            app.select_category(category);
            app.set_search(search.unwrap_or_default());
            print!("{}", render::home(app, width));
        }
        Command::Show { id } => {
            app.load().await;
            let article = app.open_article(&id)?.clone();
            print!("{}", render::article_detail(app, &article, width));
        }
        Command::Watch { category, search } => {
            app.load().await;
            app.select_category(category);
            app.set_search(search.unwrap_or_default());
            redraw(app, width);
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = app.next_event() => match event {
                        Some(event) => {
                            app.handle_event(event).await;
                            redraw(app, width);
                        }
                        None => break,
                    },
                }
            }
        }
        Command::Publish {
            title,
            content,
            subtitle,
            category,
            image,
            breaking,
            ai,
        } => {
            let mut draft = ArticleDraft::new(title, content);
            draft.subtitle = subtitle;
            draft.category = category;
            if let Some(image) = image {
                draft.image_url = image;
            }
            if let Some(hours) = breaking {
                draft.is_breaking = true;
                draft.set_breaking_hours(hours);
            }
            if ai {
                draft
                    .auto_generate(app.ai())
                    .await
                    .map_err(AppError::from)?;
            }
            let report = app.publish_draft(&draft).await?;
            print_report(&report);
            println!("Published: {}", draft.title);
        }
        Command::SuggestTitle { content } => {
            let mut draft = ArticleDraft::new(String::new(), content);
            draft
                .suggest_title(app.ai())
                .await
                .map_err(AppError::from)?;
            println!("{}", draft.title);
        }
        Command::Remove { id } => {
            let report = app.remove_article(&id).await?;
            print_report(&report);
            println!("Removed {id}");
        }
        Command::Comment { id, text } => {
            app.load().await;
            app.open_article(&id)?;
            match app.add_comment(&text).await? {
                Some(report) => print_report(&report),
                None => eprintln!("Sign in and write some text to comment."),
            }
        }
        Command::DeleteComment { article, comment } => {
            app.load().await;
            app.open_article(&article)?;
            match app.delete_comment(&comment).await? {
                Some(report) => print_report(&report),
                None => eprintln!("No comment {comment} on article {article}."),
            }
        }
        Command::Listen { id, .. } => {
            app.load().await;
            app.open_article(&id)?;
            if app.toggle_narration().await? == NarrationOutcome::Started {
                println!("Narrating... (Ctrl-C to stop)");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        app.toggle_narration().await?;
                    }
                    _ = app.wait_for_narration() => {}
                }
            }
        }
        Command::Register {
            username,
            password,
            admin_code,
        } => {
            let user = app
                .register(&username, &password, admin_code.as_deref())
                .await?;
            if user.role == Role::Admin {
                println!("נרשמת בהצלחה כמנהל!");
            } else {
                println!("נרשמת בהצלחה! כעת ניתן להתחבר");
            }
        }
        Command::Login { username, password } => {
            let user = app.login(&username, &password).await?;
            println!("{}", render::user_line(Some(user)));
        }
        Command::Logout => {
            app.logout().await?;
            println!("Signed out.");
        }
        Command::Whoami => {
            println!("{}", render::user_line(app.current_user()));
            println!("{}", render::storage_line(app.is_remote_backed()));
        }
    }
    Ok(())
}

fn redraw(app: &App, width: usize) {
    // Clear screen and home the cursor
    print!("\x1b[2J\x1b[H");
    print!("{}", render::home(app, width));
}

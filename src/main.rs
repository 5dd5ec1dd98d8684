//! ar-translate - Capture, read and translate text in the camera view
//!
//! Command line front end for the capture pipeline, the translation client
//! and the local account store.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ar_translate::app::ArTranslateApp;
use ar_translate::capture::ImageFileSurface;
use ar_translate::config::{self, AppConfig};
use ar_translate::error::AppError;
use ar_translate::storage;
use ar_translate::translation::Language;
use ar_translate::vision::ScriptedRecognizer;

/// ar-translate - Read text from the camera view and translate it
#[derive(Parser, Debug)]
#[command(name = "ar-translate")]
#[command(about = "Capture, recognize and translate text from the AR camera view")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and log in
    Signup {
        username: String,
        email: String,
        password: String,
    },
    /// Log in with an existing account
    Login { username: String, password: String },
    /// Log out and remove the stored account
    Logout,
    /// Show the current session
    Status,
    /// Show or select the target language
    Language {
        /// Language code (en, es, fr, de, zh, ru)
        code: Option<String>,
    },
    /// Translate text into the target language
    Translate {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Run the capture pipeline on an image
    Capture {
        /// Image used as the camera snapshot
        #[arg(long)]
        image: PathBuf,

        /// Text the vision engine reports for the image, in reading order
        #[arg(long = "fragment")]
        fragments: Vec<String>,
    },
    /// Manage the configuration file
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment from {:?}", path),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env file: {}", e),
    }

    let config_path = match args.config {
        Some(path) => path,
        None => storage::get_config_dir()?.join("config.toml"),
    };

    if let Command::Config { init } = args.command {
        return run_config(&config_path, init);
    }

    let config = load_or_create_config(&config_path)?;
    let mut app = ArTranslateApp::new(config)?;

    match args.command {
        Command::Signup {
            username,
            email,
            password,
        } => {
            app.session()
                .signup(&username, &email, &password)
                .map_err(report)?;
            println!("Account created. Logged in as {}", username);
        }
        Command::Login { username, password } => {
            app.session().login(&username, &password).map_err(report)?;
            println!("Logged in as {}", username);
        }
        Command::Logout => {
            app.session().logout().map_err(report)?;
            println!("Logged out");
        }
        Command::Status => print_status(&app),
        Command::Language { code } => run_language(&app, code.as_deref())?,
        Command::Translate { text } => run_translate(&app, text)?,
        Command::Capture { image, fragments } => run_capture(&mut app, image, fragments)?,
        Command::Config { .. } => {}
    }

    Ok(())
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    debug!("No configuration at {:?}", path);
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Convert a domain error into the generic message shown to the user
fn report(err: impl Into<AppError>) -> anyhow::Error {
    let err = err.into();
    debug!("{:?} failure: {}", err.kind(), err);
    anyhow!(err.user_message())
}

fn require_login(app: &ArTranslateApp) -> Result<()> {
    if !app.session().session().is_logged_in {
        bail!("Please log in first");
    }
    Ok(())
}

fn run_config(path: &Path, init: bool) -> Result<()> {
    if !init {
        println!("{}", path.display());
        return Ok(());
    }

    if path.exists() {
        bail!("Configuration already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {:?}", parent))?;
    }
    config::save_config(&AppConfig::default(), path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn print_status(app: &ArTranslateApp) {
    let session = app.session().session();
    match &session.current_username {
        Some(username) if session.is_logged_in => println!("Logged in as {}", username),
        _ => println!("Not logged in"),
    }
    println!(
        "Target language: {} ({})",
        session.target_language.display_name(),
        session.target_language.code()
    );

    let key_state = if app.config().translation.resolve_api_key().is_some() {
        "configured"
    } else {
        "missing"
    };
    println!("Translation API key: {}", key_state);
    println!("Database: {}", app.database_path().display());
}

fn run_language(app: &ArTranslateApp, code: Option<&str>) -> Result<()> {
    let Some(code) = code else {
        let current = app.session().target_language();
        for language in Language::ALL {
            let marker = if language == current { "*" } else { " " };
            println!("{} {}  {}", marker, language.code(), language.display_name());
        }
        return Ok(());
    };

    let language: Language = code.parse()?;
    app.session().set_target_language(language).map_err(report)?;
    println!("Target language set to {}", language.display_name());
    Ok(())
}

fn run_translate(app: &ArTranslateApp, texts: Vec<String>) -> Result<()> {
    require_login(app)?;

    let translator = app.translator().map_err(report)?;
    let target = app.session().target_language();

    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let translations = runtime
        .block_on(translator.translate_batch(&texts, target))
        .map_err(report)?;

    for line in translations {
        println!("{}", line);
    }
    Ok(())
}

fn run_capture(app: &mut ArTranslateApp, image: PathBuf, fragments: Vec<String>) -> Result<()> {
    require_login(app)?;

    let target = app.session().target_language();
    let surface = Arc::new(ImageFileSurface::new(image));
    let recognizer = Arc::new(ScriptedRecognizer::new(fragments));

    app.start_overlay();
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let result = {
        let pipeline = app.pipeline(surface, recognizer).map_err(report)?;
        runtime.block_on(pipeline.run(target))
    };

    // Pipeline is gone; let the overlay drain and exit
    app.stop_overlay();

    let outcome = result.map_err(report)?;
    info!(
        "Run {} translated {} fragments",
        outcome.run_id, outcome.fragment_count
    );
    Ok(())
}

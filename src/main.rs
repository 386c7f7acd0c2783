mod app;
mod clipboard;
mod clock;
mod command;
mod config;
mod editor;
mod engine;
mod error;
mod events;
mod gateway;
mod grid;
mod input;
mod mode;
mod selection;
mod sync;
mod ui;
mod util;

use std::fs::{self, File};
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::App;
use clipboard::{InProcessClipboard, NativeClipboard, SystemClipboard};
use clock::{Clock, SystemClock};
use config::Config;
use engine::{Collaborators, Engine};
use gateway::{FileStore, MemoryStore, PersistenceGateway, RealtimeFeed, RecoveryStore};

/// Config file picked up from the working directory when `--config` is not given
const DEFAULT_CONFIG: &str = "runsheet.toml";
const LOG_FILE: &str = "runsheet.log";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    store: Option<PathBuf>,
    new_name: Option<String>,
    doc_id: Option<String>,
    list: bool,
    scratch: bool,
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let value_of = |i: usize, flag: &str| -> String {
        match args.get(i + 1) {
            Some(value) => value.clone(),
            None => {
                eprintln!("Error: {} requires an argument", flag);
                std::process::exit(1);
            }
        }
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                parsed.config = Some(PathBuf::from(value_of(i, "--config")));
                i += 2;
            }
            "-s" | "--store" => {
                parsed.store = Some(PathBuf::from(value_of(i, "--store")));
                i += 2;
            }
            "-n" | "--new" => {
                parsed.new_name = Some(value_of(i, "--new"));
                i += 2;
            }
            "-l" | "--list" => {
                parsed.list = true;
                i += 1;
            }
            "--scratch" => {
                parsed.scratch = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
            _ => {
                parsed.doc_id = Some(args[i].clone());
                i += 1;
            }
        }
    }

    parsed
}

fn print_help() {
    eprintln!("runsheet - collaborative run-of-show grid editor for the terminal");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    runsheet [OPTIONS] [DOCUMENT_ID]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config <FILE>  Read settings from FILE (default: ./{} if present)", DEFAULT_CONFIG);
    eprintln!("    -s, --store <DIR>    Keep documents in DIR");
    eprintln!("    -n, --new <NAME>     Create a new document called NAME");
    eprintln!("    -l, --list           List stored documents and exit");
    eprintln!("    --scratch            Keep everything in memory, nothing is written");
    eprintln!("    -h, --help           Print this help message");
    eprintln!();
    eprintln!("Log verbosity is set with RUNSHEET_LOG (e.g. RUNSHEET_LOG=debug).");
}

fn load_config(args: &Args) -> Config {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => Config::from_file(&path).unwrap_or_else(|e| {
            eprintln!("Error in {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => Config::default(),
    };
    if let Some(store) = &args.store {
        config.store.dir = store.clone();
    }
    config
}

/// Log to a file so the alternate screen stays clean
fn init_logging(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let file = File::options().create(true).append(true).open(dir.join(LOG_FILE))?;
    let filter = EnvFilter::try_from_env("RUNSHEET_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Handle panics gracefully
fn install_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);

        if let Some(location) = info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                "panic occured"
            );
        } else {
            error!("panic occured");
        }

        if let Some(s) = info.payload().downcast_ref::<&str>() {
            error!(message = %s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            error!(message = %s);
        }

        default_hook(info);
    }));
}

fn build_engine(config: Config, scratch: bool) -> Engine {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let gateway: Arc<dyn PersistenceGateway>;
    let feed: Arc<dyn RealtimeFeed>;
    let mut recovery = None;
    if scratch {
        let store = MemoryStore::new(Arc::clone(&clock));
        gateway = Arc::new(store.clone());
        feed = Arc::new(store);
    } else {
        let store = Arc::new(FileStore::new(
            config.store.dir.clone(),
            Arc::clone(&clock),
            Duration::from_millis(config.store.watch_debounce_ms),
        ));
        gateway = store.clone();
        feed = store;
        recovery = Some(RecoveryStore::new(config.store.dir.join("recovery")));
    }

    let clipboard: Box<dyn SystemClipboard> = if scratch {
        Box::new(InProcessClipboard::default())
    } else {
        Box::new(NativeClipboard)
    };

    Engine::new(
        config,
        Collaborators {
            gateway,
            feed: Some(feed),
            clock,
            clipboard,
            recovery,
        },
    )
}

fn main() -> io::Result<()> {
    let args = parse_args();
    let config = load_config(&args);

    if args.list {
        let store = FileStore::new(config.store.dir.clone(), Arc::new(SystemClock), Duration::ZERO);
        match store.list() {
            Ok(ids) => ids.iter().for_each(|id| println!("{}", id)),
            Err(e) => {
                eprintln!("Error listing {}: {}", config.store.dir.display(), e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    init_logging(&config.store.dir)?;
    info!(store = %config.store.dir.display(), scratch = args.scratch, "runsheet started");
    install_panic_hook();

    let mut engine = build_engine(config, args.scratch);
    if let Some(id) = &args.doc_id {
        if let Err(e) = engine.open(id) {
            error!(id = %id, error = %e, "failed to open document");
            eprintln!("Could not open {}: {}", id, e);
            std::process::exit(1);
        }
    } else if let Some(name) = &args.new_name {
        engine.new_document(name);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine);
    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    result
}

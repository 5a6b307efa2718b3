//! console-surface demo
//!
//! Runs a console session against the in-process renderer: stdout and
//! stderr are mirrored to the surface while still reaching the terminal.
//!
//! # Quick Start
//!
//! ```text
//! console-surface                        # defaults / ~/.console-surface/config.toml
//! console-surface --text-color '#32cd32' --font-size 11
//! console-surface --dump                 # print what the surface received
//! ```

use std::env;
use std::sync::Arc;

use crossterm::style::SetForegroundColor;
use crossterm::Command;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use console_surface::config::app_dir;
use console_surface::intercept::redirect::identity;
use console_surface::{ConsoleOptions, ConsoleSession, MockRenderer, Transform};

/// Command line arguments
#[derive(Default)]
struct Args {
    text_color: Option<String>,
    background_color: Option<String>,
    font_size: Option<f32>,
    /// Leave stderr uncolored on the surface
    no_stderr_color: bool,
    /// Prefix stdout on the surface with the text color
    color_stdout: bool,
    /// Print the surface contents when done
    dump: bool,
    verbose: bool,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("console-surface {}", VERSION);
}

fn print_help() {
    eprintln!("console-surface {} - mirror stdout/stderr onto a console surface", VERSION);
    eprintln!();
    eprintln!("Usage: console-surface [OPTIONS]");
    eprintln!();
    eprintln!("Surface options:");
    eprintln!("  --text-color <COLOR>        Text color, e.g. green or '#32cd32'");
    eprintln!("  --background-color <COLOR>  Background color");
    eprintln!("  --font-size <SIZE>          Font point size");
    eprintln!();
    eprintln!("Output options:");
    eprintln!("  --no-stderr-color           Do not color stderr red on the surface");
    eprintln!("  --color-stdout              Color stdout with the text color on the surface");
    eprintln!("  --dump                      Print what the surface received");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  --verbose                   Debug logging");
    eprintln!("  -v, --version               Show version");
    eprintln!("  -h, --help                  Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.console-surface/config.toml");
    eprintln!("Log file:      ~/.console-surface/console-surface.log");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("Missing value for {}", flag))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--text-color" => {
                i += 1;
                parsed.text_color = Some(value(i, "--text-color")?);
            }
            "--background-color" => {
                i += 1;
                parsed.background_color = Some(value(i, "--background-color")?);
            }
            "--font-size" => {
                i += 1;
                let raw = value(i, "--font-size")?;
                let size = raw
                    .parse::<f32>()
                    .map_err(|_| format!("Invalid font size: {}", raw))?;
                parsed.font_size = Some(size);
            }
            "--no-stderr-color" => parsed.no_stderr_color = true,
            "--color-stdout" => parsed.color_stdout = true,
            "--dump" => parsed.dump = true,
            "--verbose" => parsed.verbose = true,
            arg => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to a file; stdout and stderr are the streams being redirected
fn init_logging(verbose: bool) {
    let log_path = app_dir()
        .map(|dir| dir.join("console-surface.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("console-surface.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let level = if verbose { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn build_options(args: &Args) -> ConsoleOptions {
    let mut options = ConsoleOptions::load();

    // Command line overrides the config file
    if args.text_color.is_some() {
        options.text_color = args.text_color.clone();
    }
    if args.background_color.is_some() {
        options.background_color = args.background_color.clone();
    }
    if args.font_size.is_some() {
        options.font_size = args.font_size;
    }

    if args.no_stderr_color {
        options.transform_stderr = Some(identity());
    }
    if args.color_stdout {
        let mut prefix = String::new();
        if SetForegroundColor(options.style().text_color.to_crossterm())
            .write_ansi(&mut prefix)
            .is_ok()
        {
            let transform: Transform = Arc::new(move |text: &str| format!("{}{}", prefix, text));
            options.transform_stdout = Some(transform);
        }
    }

    options
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging(args.verbose);
    info!("console-surface starting...");

    let options = build_options(&args);
    let renderer = Arc::new(MockRenderer::with_style(options.style()));
    info!(style = ?renderer.style(), "using in-process renderer");

    let console = ConsoleSession::new(renderer.clone(), options)?;

    let mut events = console.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "console event");
        }
    });

    // A native renderer announces readiness on its own
    renderer.make_ready();

    console.display(None).await?;
    info!(parent = ?console.get_parent(), "console displayed");

    console.stderr().write("Welcome to console-surface\n");
    console.stdout().write("Output written here is mirrored to the surface.\n");
    console.stdout().write("working...");
    console.stdout().move_cursor(-10, 0);
    console.stdout().write("done      \n");

    console.hide().await?;
    info!(state = %console.get_state(), "console hidden");

    console.restore_streams();

    if args.dump {
        println!("{:?}", renderer.output());
    }

    info!(bytes = renderer.output().len(), "console-surface finished");
    Ok(())
}

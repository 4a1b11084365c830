//! Hostkit server: brings up the selected plugins and runs until signalled.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use hostkit_app::{Application, signals};
use hostkit_core::config::{AppConfig, LogFormat};
use hostkit_core::error::AppError;
use plugin_heartbeat::{HeartbeatPlugin, MonitorPlugin};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "hostkit-server", version, about = "Plugin host with a prioritized run loop")]
struct Args {
    /// Directory holding `default.toml` and per-environment overlays.
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Environment overlay to load on top of the defaults.
    #[arg(long, env = "HOSTKIT_ENV", default_value = "development")]
    env: String,

    /// Plugin to initialize; repeatable. Overrides `plugins.enabled`.
    #[arg(long = "plugin", value_name = "NAME")]
    plugins: Vec<String>,

    /// Plugin option as `name=value`; repeatable. Values are parsed as
    /// JSON when possible and taken as strings otherwise.
    #[arg(long = "option", value_name = "NAME=VALUE")]
    options: Vec<String>,

    /// Print every declared plugin option with its default and exit.
    #[arg(long)]
    print_default_config: bool,
}

fn main() {
    let args = Args::parse();

    let config = match load_configuration(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, args.print_default_config) {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration files and apply command-line overrides.
fn load_configuration(args: &Args) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load(&args.config_dir, &args.env)?;

    if !args.plugins.is_empty() {
        config.plugins.enabled = args.plugins.clone();
    }

    for raw in &args.options {
        let (name, value) = raw.split_once('=').ok_or_else(|| {
            AppError::validation(format!("Option '{raw}' must look like name=value"))
        })?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        config.options.insert(name.trim().to_string(), value);
    }

    Ok(config)
}

/// Install the global tracing subscriber.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let thread_ids = config.logging.thread_ids;

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(thread_ids)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_thread_ids(thread_ids)
                .init();
        }
    }
}

fn run(config: AppConfig, print_default_config: bool) -> Result<(), AppError> {
    tracing::info!("Starting hostkit v{}", env!("CARGO_PKG_VERSION"));

    hostkit_plugin::register::<HeartbeatPlugin>();
    hostkit_plugin::register::<MonitorPlugin>();

    let mut app = Application::with_config(config)?;

    if print_default_config {
        return app.print_default_config(&mut std::io::stdout().lock());
    }

    app.initialize_from_config()?;
    let _signals = signals::install(&app.handle())?;

    app.startup()?;
    tracing::info!(plugins = ?app.running_plugins(), "Hostkit running");
    app.run()?;

    tracing::info!("Hostkit stopped");
    Ok(())
}

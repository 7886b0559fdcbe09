use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use sd_actions::default_registry;
use sd_config::{load_settings, Settings};
use sd_core::{ActionRegistry, Category, CommandRunner, CoreError, OsId, PreviewKind};
use sd_utils::SystemRunner;

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "sysdeck", version, about = "Menu-driven system toolbox for macOS and Linux")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Render the preview pane for one picker row.
    #[command(hide = true)]
    Preview {
        #[arg(long, value_enum)]
        kind: PreviewKindArg,
        /// Highlighted picker row.
        label: String,
    },
    /// Print every registered action.
    #[command(hide = true)]
    List,
}

#[derive(Clone, ValueEnum)]
enum PreviewKindArg {
    Action,
    Package,
    Font,
}

impl From<PreviewKindArg> for PreviewKind {
    fn from(value: PreviewKindArg) -> Self {
        match value {
            PreviewKindArg::Action => PreviewKind::Action,
            PreviewKindArg::Package => PreviewKind::Package,
            PreviewKindArg::Font => PreviewKind::Font,
        }
    }
}

pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = load_settings().context("failed to load settings")?;
    init_tracing(settings.log_level.as_deref());

    let os = OsId::current();
    let registry = default_registry().context("failed to build action registry")?;
    debug!(%os, actions = registry.len(), "registry ready");

    match cli.command {
        Some(Command::Preview { kind, label }) => {
            // fzf draws the preview pane itself and understands ANSI.
            let color = settings.use_color(true);
            let text =
                sd_session::render_preview(&settings, &registry, os, kind.into(), &label, color);
            println!("{text}");
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::List) => {
            print!("{}", render_listing(&registry));
            Ok(ExitCode::SUCCESS)
        }
        None => interactive(&settings, &registry, os),
    }
}

fn interactive(settings: &Settings, registry: &ActionRegistry, os: OsId) -> Result<ExitCode> {
    let runner = SystemRunner::new();
    let user = std::env::var("USER").ok();
    let elevate = settings.elevate(runner.is_available("sudo"), user.as_deref());
    let color = settings.use_color(io::stdout().is_terminal());

    match sd_session::run(settings, registry, os, elevate, color) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if interrupted(&err) => Ok(ExitCode::from(130)),
        Err(err) => {
            if let Some(core) = err.downcast_ref::<CoreError>() {
                error!(error = %core, fatal = core.is_fatal(), "session aborted");
            }
            Err(err)
        }
    }
}

fn interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::Interrupted)
    })
}

fn render_listing(registry: &ActionRegistry) -> String {
    let mut out = String::new();
    for category in [Category::Menu, Category::Installable] {
        let label = match category {
            Category::Menu => "menu",
            Category::Installable => "install",
        };
        for name in registry.list_by_category(category) {
            let platforms = registry.lookup(name).map_or_else(
                |_| String::new(),
                |action| {
                    if action.has_fallback() {
                        "all".to_string()
                    } else {
                        let names: Vec<&str> =
                            action.platforms().into_iter().map(OsId::as_str).collect();
                        names.join(",")
                    }
                },
            );
            out.push_str(&format!("{name}\t{label}\t{platforms}\n"));
        }
    }
    out
}

/// `RUST_LOG` wins, then the configured level, then `warn`. Logs go to stderr.
fn init_tracing(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

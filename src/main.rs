use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use linenav::config::{filter_status, Settings};
use linenav::highlight::{self, TeardownGuard};
use linenav::host::MemoryHost;
use linenav::navigator::Navigator;
use linenav::output;
use linenav::scope::{FilterOverride, Scope, ScopeKind, ScopeSpec};
use linenav::utils::{find_project_root, get_settings_path, progress::search_spinner};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linenav")]
#[command(about = "Narrow files down to the lines containing every keyword")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Keywords (when no subcommand is given). Wrap phrases in backticks.
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Folder to search (defaults to the configured search folder, then ".")
    #[arg(short, long)]
    path: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct CommonArgs {
    /// Maximum display width of a result line
    #[arg(long, global = true)]
    max_width: Option<usize>,

    /// Turn extension filtering off for this search
    #[arg(long, global = true, conflicts_with = "filters")]
    no_filters: bool,

    /// Turn extension filtering on for this search
    #[arg(long, global = true)]
    filters: bool,

    /// Never use the external matcher
    #[arg(long, global = true)]
    native: bool,

    /// When to color output
    #[arg(long, global = true, value_enum, default_value_t = ColorWhen::Auto)]
    color: ColorWhen,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorWhen {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a single file
    File {
        file: PathBuf,
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Search a set of files as if they were open buffers
    Open {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short, long, default_value = "")]
        query: String,
    },
    /// Search project folders (defaults to the enclosing repository)
    Project {
        #[arg(long = "folder")]
        folders: Vec<PathBuf>,
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show whether extension filtering applies to each scope
    Filters,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the settings file location and contents
    Show,
    /// Flip the global extension filter switch
    ToggleFilters,
    /// Set the folder searched by default
    SetFolder { dir: PathBuf },
    /// Forget the default search folder
    ClearFolder,
}

impl CommonArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(width) = self.max_width {
            settings.max_display_length = width;
        }
        if self.native {
            settings.use_accelerated_matcher = false;
        }
    }

    fn filter_override(&self) -> FilterOverride {
        if self.filters {
            FilterOverride::Enabled
        } else if self.no_filters {
            FilterOverride::Disabled
        } else {
            FilterOverride::Inherit
        }
    }

    fn color_choice(&self) -> ColorChoice {
        match self.color {
            ColorWhen::Always => ColorChoice::Always,
            ColorWhen::Never => ColorChoice::Never,
            ColorWhen::Auto if io::stdout().is_terminal() => ColorChoice::Auto,
            ColorWhen::Auto => ColorChoice::Never,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("LINENAV_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::File { file, query }) => {
            search(search_settings(&cli.common)?, &cli.common, &query.join(" "), |host| {
                host.open_from_disk(&file)
                    .with_context(|| format!("Failed to open {}", file.display()))?;
                Ok(Scope::CurrentFile)
            })?;
        }
        Some(Commands::Open { files, query }) => {
            search(search_settings(&cli.common)?, &cli.common, &query, |host| {
                for file in &files {
                    host.open_from_disk(file)
                        .with_context(|| format!("Failed to open {}", file.display()))?;
                }
                Ok(Scope::OpenFiles)
            })?;
        }
        Some(Commands::Project { folders, query }) => {
            let folders = if folders.is_empty() {
                vec![find_project_root(&std::env::current_dir()?)?]
            } else {
                folders
            };
            search(search_settings(&cli.common)?, &cli.common, &query.join(" "), |host| {
                host.set_project_folders(folders);
                Ok(Scope::Project(Vec::new()))
            })?;
        }
        Some(Commands::Config { action }) => {
            // Persist only what is in the file, not environment or flag overrides
            let settings = Settings::load_from(&get_settings_path()?).context("Failed to load settings")?;
            configure(settings, action)?;
        }
        Some(Commands::Filters) => {
            let settings = search_settings(&cli.common)?;
            let session = match cli.common.filter_override() {
                FilterOverride::Enabled => Some(true),
                FilterOverride::Disabled => Some(false),
                FilterOverride::Inherit => None,
            };
            let statuses = filter_status(&settings, session);
            let mut stdout = StandardStream::stdout(cli.common.color_choice());
            output::write_filter_status(&mut stdout, &statuses)?;
        }
        None => {
            let settings = search_settings(&cli.common)?;
            if cli.path.is_none() && settings.default_search_scope == ScopeKind::Project {
                let root = find_project_root(&std::env::current_dir()?)?;
                search(settings, &cli.common, &cli.query.join(" "), |host| {
                    host.set_project_folders(vec![root]);
                    Ok(Scope::Project(Vec::new()))
                })?;
                return Ok(());
            }

            let root = cli
                .path
                .clone()
                .or_else(|| settings.search_folder())
                .unwrap_or_else(|| PathBuf::from("."));
            search(settings, &cli.common, &cli.query.join(" "), |_| {
                Ok(Scope::Folder(root))
            })?;
        }
    }

    Ok(())
}

/// Settings file plus environment, with command-line flags on top.
fn search_settings(common: &CommonArgs) -> Result<Settings> {
    let mut settings = Settings::load().context("Failed to load settings")?;
    common.apply(&mut settings);
    Ok(settings)
}

/// Run one query through a navigator backed by an in-memory host.
fn search(
    settings: Settings,
    common: &CommonArgs,
    query: &str,
    setup: impl FnOnce(&MemoryHost) -> Result<Scope>,
) -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let registry = highlight::install(host.clone());
    let _teardown = TeardownGuard::new();

    let scope = setup(&host)?;
    let kind = scope.kind();
    let navigator = Navigator::new(Arc::clone(&host), settings, registry)?;
    let spec = ScopeSpec::new(scope).with_override(common.filter_override());

    let show_spinner = !common.json && kind != ScopeKind::CurrentFile && io::stderr().is_terminal();
    let spinner = search_spinner(format!("Searching {}...", kind), show_spinner);
    let results = navigator.run_query(&spec, query);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let results = results?;

    if common.json {
        output::write_json(&mut io::stdout().lock(), &results)?;
    } else {
        output::print_entries(&results.entries, common.color_choice())?;
        eprintln!("{}", results.summary());
    }

    navigator.shutdown();
    Ok(())
}

fn configure(mut settings: Settings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", get_settings_path()?.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigAction::ToggleFilters => {
            settings.extension_filters = !settings.extension_filters;
            println!(
                "Extension filters {}",
                if settings.extension_filters { "enabled" } else { "disabled" }
            );
        }
        ConfigAction::SetFolder { dir } => {
            if !dir.is_dir() {
                bail!("Not a directory: {}", dir.display());
            }
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Invalid path: {}", dir.display()))?;
            settings.search_folder_path = dir.display().to_string();
            println!("Search folder set to {}", dir.display());
        }
        ConfigAction::ClearFolder => {
            settings.search_folder_path.clear();
            println!("Search folder cleared");
        }
    }
    settings.save()
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use textloader_builder::{BuildConfig, build_input_json};
use textloader_core::{
    BatchProgress, CheckConfig, InputSelection, TranslationUploadConfig, UploadConfig, check_bdrc,
    upload_texts, upload_translations,
};
use textloader_shared::{ApiSettings, AppConfig, init_config, load_config, write_json_or_stdout};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// textloader: prepare and upload text corpora to the text API.
#[derive(Parser)]
#[command(
    name = "textloader",
    version,
    about = "Build per-text input folders, check BDRC ids, and upload texts and translations.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Convert source corpus files into one input folder per text.
    Build {
        /// Directory holding the source JSON files.
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Root to write the per-text folders into.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Look up each text's BDRC id on the API.
    Check {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        api: ApiArgs,

        /// Write (or merge into) a BDRC cache file at this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Create texts and instances on the API.
    Upload {
        #[command(flatten)]
        input: InputArgs,

        #[command(flatten)]
        api: ApiArgs,

        #[command(flatten)]
        batch: BatchArgs,

        /// Skip texts whose BDRC id already exists.
        #[arg(long)]
        skip_existing_bdrc: bool,

        /// BDRC cache file to answer existence from, instead of live lookups.
        #[arg(long)]
        bdrc_cache: Option<PathBuf>,

        /// Instance metadata JSON used for items without metadata.
        #[arg(long)]
        instance_metadata: Option<PathBuf>,

        /// Write translation_plan.json (with instance_id) next to each
        /// folder's translation payloads.
        #[arg(long)]
        write_translation_plan: bool,
    },

    /// Upload the translations listed in a plan file.
    Translate {
        /// Translation plan JSON.
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        api: ApiArgs,

        #[command(flatten)]
        batch: BatchArgs,

        /// Skip entries missing instance_id instead of failing them.
        #[arg(long)]
        skip_missing_instance_id: bool,

        /// Remove segmentation/target/alignment annotations before upload.
        #[arg(long)]
        strip_annotations: bool,

        /// Author person_id to include when an entry has none.
        #[arg(long)]
        author_person_id: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Which items a batch runs over.
#[derive(Args, Debug)]
pub(crate) struct InputArgs {
    /// Upload plan JSON (list of {text, instance | content} items).
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// A single folder containing text_metadata.json.
    #[arg(long)]
    pub input_folder: Option<PathBuf>,

    /// Process every folder under --input-root.
    #[arg(long)]
    pub all: bool,

    /// Root holding one folder per text (defaults to config paths.input_root).
    #[arg(long)]
    pub input_root: Option<PathBuf>,
}

/// Connection overrides, applied on top of the config file.
#[derive(Args, Debug)]
pub(crate) struct ApiArgs {
    /// Base URL of the text API.
    #[arg(long, env = "TEXT_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// API token.
    #[arg(long, env = "TEXT_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Header that carries the token.
    #[arg(long, env = "TEXT_API_AUTH_HEADER")]
    pub auth_header: Option<String>,

    /// Scheme prefix for the token, e.g. Bearer.
    #[arg(long, env = "TEXT_API_AUTH_SCHEME")]
    pub auth_scheme: Option<String>,
}

/// Options shared by the two upload tools.
#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Build payloads and report them without sending anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the first N items.
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Process at most N items.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Pause between items, in seconds (defaults to config upload.sleep_seconds).
    #[arg(long)]
    pub sleep_seconds: Option<f64>,

    /// Write the report JSON to this path instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
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

/// Initialize tracing based on CLI flags. Logs go to stderr so that
/// reports on stdout stay valid JSON.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "textloader=info",
        1 => "textloader=debug",
        _ => "textloader=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            source_dir,
            output_dir,
        } => cmd_build(source_dir, output_dir),
        Command::Check { input, api, output } => cmd_check(&input, &api, output.as_deref()).await,
        Command::Upload {
            input,
            api,
            batch,
            skip_existing_bdrc,
            bdrc_cache,
            instance_metadata,
            write_translation_plan,
        } => {
            let config = load_config()?;
            let mut upload = UploadConfig::new(
                resolve_selection(&input, &config)?,
                resolve_api(&api, &config)?,
            );
            upload.skip_existing = skip_existing_bdrc;
            upload.bdrc_cache = bdrc_cache;
            upload.dry_run = batch.dry_run;
            upload.start = batch.start;
            upload.limit = batch.limit;
            upload.sleep_seconds = batch.sleep_seconds.unwrap_or(config.upload.sleep_seconds);
            upload.instance_metadata = instance_metadata;
            upload.write_translation_plan = write_translation_plan;
            cmd_upload(&upload, batch.output.as_deref()).await
        }
        Command::Translate {
            input,
            api,
            batch,
            skip_missing_instance_id,
            strip_annotations,
            author_person_id,
        } => {
            let config = load_config()?;
            let mut translate = TranslationUploadConfig::new(input, resolve_api(&api, &config)?);
            translate.skip_missing_instance_id = skip_missing_instance_id;
            translate.strip_annotations = strip_annotations;
            translate.author_person_id = author_person_id;
            translate.dry_run = batch.dry_run;
            translate.start = batch.start;
            translate.limit = batch.limit;
            translate.sleep_seconds = batch.sleep_seconds.unwrap_or(config.upload.sleep_seconds);
            cmd_translate(&translate, batch.output.as_deref()).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Option resolution
// ---------------------------------------------------------------------------

/// Pick the batch input: a plan file, every folder under the root, or one folder.
fn resolve_selection(args: &InputArgs, config: &AppConfig) -> Result<InputSelection> {
    if let Some(plan) = &args.input {
        return Ok(InputSelection::Plan(plan.clone()));
    }
    if args.all {
        let root = args
            .input_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.paths.input_root));
        return Ok(InputSelection::All(root));
    }
    if let Some(folder) = &args.input_folder {
        return Ok(InputSelection::Folder(folder.clone()));
    }
    Err(eyre!(
        "provide --input, --input-folder, or --all with --input-root"
    ))
}

/// Config file values, overridden by any flag or env var that is set.
fn resolve_api(args: &ApiArgs, config: &AppConfig) -> Result<ApiSettings> {
    let mut config = config.clone();
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.api.timeout_secs = timeout;
    }
    if let Some(header) = &args.auth_header {
        config.api.auth_header = header.clone();
    }
    if let Some(scheme) = &args.auth_scheme {
        config.api.auth_scheme = scheme.clone();
    }

    let mut settings = ApiSettings::from_config(&config)?;
    if let Some(token) = args.token.as_ref().filter(|t| !t.is_empty()) {
        settings.token = Some(token.clone());
    }
    Ok(settings)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(source_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let build = BuildConfig {
        source_dir: source_dir.unwrap_or_else(|| PathBuf::from(&config.paths.source_dir)),
        output_dir: output_dir.unwrap_or_else(|| PathBuf::from(&config.paths.input_root)),
    };

    let report = build_input_json(&build)?;
    write_json_or_stdout(None, &report)?;
    Ok(())
}

async fn cmd_check(input: &InputArgs, api: &ApiArgs, output: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let check = CheckConfig {
        selection: resolve_selection(input, &config)?,
        api: resolve_api(api, &config)?,
    };
    info!(base_url = %check.api.base_url, "checking BDRC ids");

    let reporter = CliProgress::new();
    let report = check_bdrc(&check, &reporter).await?;
    write_json_or_stdout(None, &report.items)?;

    if let Some(path) = output {
        let merged = report.to_cache().save_merged(path)?;
        info!(path = %path.display(), entries = merged.len(), "BDRC cache written");
    }
    Ok(())
}

async fn cmd_upload(upload: &UploadConfig, output: Option<&Path>) -> Result<()> {
    info!(base_url = %upload.api.base_url, "uploading texts");
    let reporter = CliProgress::new();
    let report = upload_texts(upload, &reporter).await?;
    write_json_or_stdout(output, &report)?;
    if let Some(path) = output {
        info!(path = %path.display(), instances = report.instance_ids.len(), "upload report written");
    }
    Ok(())
}

async fn cmd_translate(translate: &TranslationUploadConfig, output: Option<&Path>) -> Result<()> {
    info!(base_url = %translate.api.base_url, "uploading translations");
    let reporter = CliProgress::new();
    let report = upload_translations(translate, &reporter).await?;
    write_json_or_stdout(output, &report)?;
    if let Some(path) = output {
        info!(path = %path.display(), "translation report written");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
            .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl BatchProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item_started(&self, label: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }

    fn done(&self, summary: &str) {
        self.spinner.finish_and_clear();
        info!(summary, "batch finished");
    }
}

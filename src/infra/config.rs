use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Defaults read from `uzdir.toml` (or yaml/json) and `UZDIR_*` env vars.
/// Every field is optional; command-line flags take precedence.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Default extraction password
    pub password: Option<String>,

    /// Password map JSON path
    pub password_map: Option<PathBuf>,

    /// Archive extensions, comma separated
    pub zip_format: Option<String>,

    /// Upper bound on concurrent extractions (0 = CPU count)
    pub max_concurrency: Option<usize>,

    /// Nest output by archive name
    pub fullpath: Option<bool>,

    /// Entry-name ignore patterns, comma separated
    pub ignore: Option<String>,

    /// Post-extract filter spec, comma separated
    pub filter: Option<String>,

    /// Write log files into the output directory
    pub log: Option<bool>,

    /// Path to the 7-Zip executable
    pub seven_zip: Option<PathBuf>,
}

impl Config
{
    /// Template written by `uzdir init`
    pub fn template() -> Self
    {
        Self {
            password: Some(String::new()),
            password_map: None,
            zip_format: Some(crate::core::options::DEFAULT_ARCHIVE_EXTENSIONS.to_string()),
            max_concurrency: Some(0),
            fullpath: Some(true),
            ignore: Some("node_modules,__MACOSX".to_string()),
            filter: None,
            log: Some(false),
            seven_zip: Some(PathBuf::from("7z")),
        }
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["uzdir.toml", "uzdir.yaml", "uzdir.json", ".uzdir.toml"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with UZDIR_ prefix (UZDIR_SEVEN_ZIP, UZDIR_ZIP_FORMAT, ...)
    builder = builder.add_source(env_source());

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// `UZDIR_*` variables. Values stay strings until deserialization so that
/// passwords like `00123` or `TRUE` reach the resolver untouched; numeric and
/// boolean fields are converted by the `Config` field types.
fn env_source() -> config::Environment
{
    config::Environment::with_prefix("UZDIR").prefix_separator("_")
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("uzdir.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let toml_string =
        toml::to_string_pretty(&Config::template()).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would write {}:\n{}", config_path.display(), toml_string);
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}

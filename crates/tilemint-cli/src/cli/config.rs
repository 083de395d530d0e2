use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tilemint_store::tilemint::{DEFAULT_CHARSET, DEFAULT_SERIAL_LENGTH};

/// Runtime configuration for the `tilemint` binary.
///
/// Global options are read from CLI arguments or environment variables
/// (a `.env` file in the working directory is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tilemint",
    version,
    about = "Allocates tile and serial identifiers for manufacturing lots"
)]
pub struct CliArgs {
    /// JSON document holding product templates, customer policies, split
    /// steps and frontend code tables.
    ///
    /// Environment variable: `TILEMINT_CONFIG`
    #[arg(long, global = true, env = "TILEMINT_CONFIG", default_value_t = String::from("tilemint.json"))]
    pub config: String,

    /// JSON document holding issued lots and lot summaries. Created on the
    /// first commit.
    ///
    /// Environment variable: `TILEMINT_STORE`
    #[arg(long, global = true, env = "TILEMINT_STORE", default_value_t = String::from("records.json"))]
    pub store: String,

    /// Attempts per run when another writer holds the customer or the record
    /// file.
    ///
    /// Environment variable: `TILEMINT_MAX_ATTEMPTS`
    #[arg(long, global = true, env = "TILEMINT_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Delay before the first retry, doubled on every further attempt.
    ///
    /// Environment variable: `TILEMINT_BACKOFF_MS`
    #[arg(long, global = true, env = "TILEMINT_BACKOFF_MS", default_value_t = 100)]
    pub backoff_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Allocate and persist the identifiers for one lot.
    Generate {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        product: String,
        #[arg(long, default_value_t = String::new())]
        version: String,
        #[arg(long, default_value_t = String::new())]
        step: String,
        #[arg(long)]
        lot: String,
        #[arg(long)]
        qty: usize,
        /// Selects `<config>.<env>.json` and `<store>.<env>.json`.
        #[arg(long, default_value_t = String::new())]
        env: String,
    },

    /// Print successive serials without touching any store.
    Serial {
        /// `""` (plain), `A00`, `AA-00` or `A000`.
        #[arg(long, default_value_t = String::new())]
        pattern: String,
        #[arg(long, default_value_t = String::from(DEFAULT_CHARSET))]
        charset: String,
        /// Comma-separated characters removed from the charset.
        #[arg(long, default_value_t = String::new())]
        exclude: String,
        /// Serial to continue from. Defaults to the pattern's seed.
        #[arg(long)]
        from: Option<String>,
        /// Seed length when `--from` is not given.
        #[arg(long, default_value_t = DEFAULT_SERIAL_LENGTH)]
        length: usize,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Issue and persist frontend identifiers for one lot: the
    /// product/machine/date prefix followed by three-character base-36
    /// codes continuing the prefix's last issued code.
    Frontend {
        #[arg(long)]
        lot: String,
        #[arg(long)]
        qty: usize,
        #[arg(long)]
        product_no: String,
        #[arg(long)]
        equipment: String,
        /// Checkout time picking the date codes, e.g. `2025-03-07T14:00:00`.
        /// Defaults to now.
        #[arg(long)]
        checkout: Option<NaiveDateTime>,
    },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub config_path: PathBuf,
    pub store_path: PathBuf,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub command: Command,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.max_attempts == 0 {
            bail!("TILEMINT_MAX_ATTEMPTS must be greater than 0");
        }

        let env = match &args.command {
            Command::Generate { env, .. } => env.trim(),
            _ => "",
        };
        if env.contains(['/', '\\']) {
            bail!("environment `{env}` must not contain path separators");
        }

        Ok(Self {
            config_path: for_environment(Path::new(&args.config), env),
            store_path: for_environment(Path::new(&args.store), env),
            max_attempts: args.max_attempts,
            backoff: Duration::from_millis(args.backoff_ms),
            command: args.command,
        })
    }
}

/// `records.json` becomes `records.<env>.json`; a blank `env` leaves `path`
/// alone.
fn for_environment(path: &Path, env: &str) -> PathBuf {
    if env.is_empty() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{env}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{env}"),
    };
    path.with_file_name(name)
}

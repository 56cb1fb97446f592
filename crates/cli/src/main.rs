mod cmd;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "schemata", version, about = "Versioned note type schemas for plain-text documents")]
struct Cli {
    /// Path to config file (defaults to $XDG_CONFIG_HOME/schemata/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the document root from the config file
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate the configuration and report resolved paths
    Doctor,

    /// List registered note types
    Types(TypesArgs),

    /// Register a note type from a YAML definition
    Register(RegisterArgs),

    /// Remove a note type from the registry
    Unregister {
        /// Note type id
        id: String,
    },

    /// Validate a document, or every document below a folder
    Validate(ValidateArgs),

    /// Detect the note type of a document
    Detect {
        /// Document path, relative to the document root
        path: PathBuf,
    },

    /// List or run schema migrations
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
pub struct TypesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include deprecated types
    #[arg(long)]
    pub all: bool,

    /// Only show types in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only show types carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// YAML file holding the note type definition
    pub file: PathBuf,

    /// Replace an existing definition with the same id
    #[arg(long)]
    pub overwrite: bool,

    /// Allow an overwrite without a version increase
    #[arg(long)]
    pub no_compat_check: bool,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Document or folder, relative to the document root
    pub path: PathBuf,

    /// Validate against this note type instead of detecting one
    #[arg(long = "type")]
    pub type_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct MigrateArgs {
    /// List migrations and their status (default)
    #[arg(long)]
    pub list: bool,

    /// Run one migration by id
    #[arg(long, value_name = "ID")]
    pub run: Option<String>,

    /// Run every pending migration
    #[arg(long)]
    pub all: bool,

    /// Run the pending migrations marked for unattended runs
    #[arg(long)]
    pub auto: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let root = cli.root.as_deref();

    match cli.command {
        Commands::Doctor => cmd::doctor::run(config, root),
        Commands::Types(args) => cmd::types::run(config, root, args).await,
        Commands::Register(args) => cmd::register::run(config, root, args).await,
        Commands::Unregister { id } => cmd::unregister::run(config, root, &id).await,
        Commands::Validate(args) => cmd::validate::run(config, root, args).await,
        Commands::Detect { path } => cmd::detect::run(config, root, &path).await,
        Commands::Migrate(args) => cmd::migrate::run(config, root, args).await,
    }
}

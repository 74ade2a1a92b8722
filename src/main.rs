use clap::{Parser, Subcommand};
use plugman::config::ROOT_ENV;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "plugman")]
#[command(about = "Download and manage third-party plugins from a module registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Install root holding pkg/, cache/ and PluginManager.json
    #[arg(long, global = true, env = ROOT_ENV)]
    root: Option<std::path::PathBuf>,

    /// Only treat directories with both manifest.json and go.mod as plugins
    #[arg(long, global = true)]
    strict: bool,

    /// Suppress progress output and informational logs
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "PLUGMAN_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages or versions
    List {
        #[command(subcommand)]
        target: ListTarget,
    },
    /// Download and install a version of a plugin
    Download {
        /// Module path of the plugin, e.g. github.com/acme/teleport
        #[arg(short, long)]
        url: String,
        /// Version to install, or @latest
        #[arg(short, long, default_value = "@latest")]
        version: String,
    },
    /// Remove installed versions of a plugin
    Remove {
        /// Installed plugin name, e.g. github.com/acme/teleport
        #[arg(short, long)]
        name: String,
        /// Version to remove, or @all
        #[arg(short, long, default_value = "@all")]
        version: String,
    },
    /// Create the install root and default config
    Init,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ListTarget {
    /// List versions published on the registry
    #[command(visible_alias = "r")]
    Remote {
        /// Module path of the plugin
        #[arg(short, long)]
        url: String,
    },
    /// List installed plugins
    #[command(visible_alias = "l")]
    Local,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command results.
    let default_filter = if cli.quiet { "plugman=warn" } else { "plugman=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let ctx = cli::Context::load(cli.root, cli.strict, cli.quiet)?;

    match cli.command {
        Commands::List { target } => match target {
            ListTarget::Remote { url } => cli::list::cmd_list_remote(&ctx, &url).await,
            ListTarget::Local => cli::list::cmd_list_local(&ctx),
        },
        Commands::Download { url, version } => {
            cli::install::cmd_download(&ctx, &url, &version).await
        }
        Commands::Remove { name, version } => cli::remove::cmd_remove(&ctx, &name, &version),
        Commands::Init => cli::cmd_init(&ctx),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::cmd_config_show(&ctx),
        },
    }
}

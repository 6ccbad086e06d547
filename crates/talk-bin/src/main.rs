//! talkbridge - send chat messages through an authenticated talk session.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use talk_config_and_utils::{init_logging, Config, Paths};

/// talkbridge command-line interface.
#[derive(Parser)]
#[command(name = "talkbridge")]
#[command(about = "Authenticate a talk account and send chat messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (session, logs, config). Defaults to ~/.talkbridge
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Account email
    #[arg(long, env = "TALK_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "TALK_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,

    /// External token used to confirm the passcode without a second device
    #[arg(long, env = "TALK_AUTH_TOKEN", global = true, hide_env_values = true)]
    auth_token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a chat
    Send {
        /// Target chat id
        #[arg(long)]
        chat_id: i64,
        /// Message text
        #[arg(short, long, default_value = "")]
        message: String,
        /// Attachment payload as JSON
        #[arg(long)]
        attachment: Option<String>,
        /// Chat log type of the attachment
        #[arg(long, default_value_t = 1)]
        attachment_type: i64,
    },
    /// Refresh or establish the session
    Login,
    /// Show the stored session without contacting the service
    Status,
    /// Remove the stored tokens
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, &paths);

    let auth = commands::AuthArgs {
        email: cli.email,
        password: cli.password,
        auth_token: cli.auth_token,
    };

    let code = match cli.command {
        Commands::Send {
            chat_id,
            message,
            attachment,
            attachment_type,
        } => {
            let attachment = commands::parse_attachment(attachment.as_deref(), attachment_type)?;
            commands::send(&config, &paths, auth, chat_id, &message, attachment).await?
        }
        Commands::Login => commands::login(&config, &paths, auth).await?,
        Commands::Status => commands::status(&paths)?,
        Commands::Logout => commands::logout(&config, &paths).await?,
    };

    std::process::exit(code);
}

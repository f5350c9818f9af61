//! MiniCloud CLI - a terminal console for MiniCloud.
//!
//! Manage buckets, objects, functions and queue messages on a MiniCloud
//! backend. The session survives between invocations; list reads are cached
//! for the lifetime of one command.

mod app;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser, Debug)]
#[command(name = "minicloud", version, about = "Console for a MiniCloud backend")]
struct Cli {
    /// Backend base URL (overrides the saved configuration)
    #[arg(long, global = true, env = "MINICLOUD_API_URL")]
    api_url: Option<String>,

    /// Print lists as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Remember the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the session
    Logout,
    /// Show the signed-in account
    Whoami,
    #[command(subcommand)]
    Buckets(BucketCommand),
    #[command(subcommand)]
    Objects(ObjectCommand),
    #[command(subcommand)]
    Functions(FunctionCommand),
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Check whether the backend is up
    Health {
        /// Keep polling every 20 seconds
        #[arg(long)]
        watch: bool,
    },
    /// Load buckets, functions and the first bucket's objects at once
    Overview,
    /// Show or set the UI theme preference (dark, light or toggle)
    Theme { theme: Option<String> },
}

#[derive(Subcommand, Debug)]
enum BucketCommand {
    List {
        #[arg(long)]
        refresh: bool,
    },
    Create { name: String },
    /// Show one bucket
    Show { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ObjectCommand {
    List {
        bucket: String,
        #[arg(long)]
        refresh: bool,
    },
    Upload {
        bucket: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    Download {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    Delete { key: String },
    /// Print a shareable download link
    Url { key: String },
}

#[derive(Subcommand, Debug)]
enum FunctionCommand {
    List {
        #[arg(long)]
        refresh: bool,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "python")]
        runtime: String,
        #[arg(long)]
        code_file: PathBuf,
    },
    /// Run a function and print its result
    Invoke {
        name: String,
        /// JSON object passed to the handler
        #[arg(long)]
        input: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    Send {
        payload: String,
        #[arg(long, default_value = minicloud_core::DEFAULT_QUEUE)]
        queue: String,
    },
    Messages {
        #[arg(long, default_value = minicloud_core::DEFAULT_QUEUE)]
        queue: String,
        #[arg(long)]
        refresh: bool,
    },
    /// Take the next pending message off a queue
    Receive {
        #[arg(long, default_value = minicloud_core::DEFAULT_QUEUE)]
        queue: String,
    },
    /// Acknowledge a received message
    Ack {
        id: i64,
        /// Report the message as failed so it is retried
        #[arg(long)]
        failed: bool,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level, e.g. RUST_LOG=minicloud_core=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();
    info!("MiniCloud CLI starting");

    let mut app = App::new(cli.api_url, cli.json)?;
    let result = run(&mut app, cli.command).await;
    app.report_reauth();

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Login { email, remember } => app.login(email, remember).await,
        Command::Register { name, email } => app.register(&name, &email).await,
        Command::Logout => app.logout(),
        Command::Whoami => app.whoami(),
        Command::Buckets(cmd) => match cmd {
            BucketCommand::List { refresh } => app.list_buckets(refresh).await,
            BucketCommand::Create { name } => app.create_bucket(&name).await,
            BucketCommand::Show { id } => app.show_bucket(id).await,
            BucketCommand::Delete { id } => app.delete_bucket(id).await,
        },
        Command::Objects(cmd) => match cmd {
            ObjectCommand::List { bucket, refresh } => app.list_objects(&bucket, refresh).await,
            ObjectCommand::Upload { bucket, files } => app.upload(&bucket, &files).await,
            ObjectCommand::Download { key, output } => app.download(&key, output).await,
            ObjectCommand::Delete { key } => app.delete_object(&key).await,
            ObjectCommand::Url { key } => app.object_url(&key),
        },
        Command::Functions(cmd) => match cmd {
            FunctionCommand::List { refresh } => app.list_functions(refresh).await,
            FunctionCommand::Create {
                name,
                runtime,
                code_file,
            } => app.create_function(name, runtime, &code_file).await,
            FunctionCommand::Invoke { name, input } => app.invoke_function(&name, input.as_deref()).await,
        },
        Command::Queue(cmd) => match cmd {
            QueueCommand::Send { payload, queue } => app.send_message(&queue, &payload).await,
            QueueCommand::Messages { queue, refresh } => app.list_messages(&queue, refresh).await,
            QueueCommand::Receive { queue } => app.receive_message(&queue).await,
            QueueCommand::Ack { id, failed } => app.ack_message(id, !failed).await,
        },
        Command::Health { watch } => app.health(watch).await,
        Command::Overview => app.overview().await,
        Command::Theme { theme } => app.theme(theme.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_queue_defaults_to_default_queue() {
        let cli = Cli::try_parse_from(["minicloud", "queue", "send", "hello"]).unwrap();
        match cli.command {
            Command::Queue(QueueCommand::Send { payload, queue }) => {
                assert_eq!(payload, "hello");
                assert_eq!(queue, "default");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ack_defaults_to_success() {
        let cli = Cli::try_parse_from(["minicloud", "queue", "ack", "12"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Queue(QueueCommand::Ack { id: 12, failed: false })
        ));
    }

    #[test]
    fn test_invoke_takes_optional_input() {
        let cli = Cli::try_parse_from(["minicloud", "functions", "invoke", "resize", "--input", "{}"]).unwrap();
        match cli.command {
            Command::Functions(FunctionCommand::Invoke { name, input }) => {
                assert_eq!(name, "resize");
                assert_eq!(input.as_deref(), Some("{}"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(Cli::try_parse_from(["minicloud", "objects", "upload", "photos"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "minicloud",
            "buckets",
            "list",
            "--json",
            "--api-url",
            "http://cloud:9000",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.api_url.as_deref(), Some("http://cloud:9000"));
    }
}

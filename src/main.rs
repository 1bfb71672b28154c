use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use paperscan::config::AppConfig;
use paperscan::shell::{ScanOutcome, Shell};

#[derive(Parser)]
#[command(name = "paperscan", version, about = "Scan documents, name them with AI, upload to Paperless-ngx")]
struct Cli {
    /// Settings file (defaults to ./config.yaml)
    #[arg(long, global = true, env = "PAPERSCAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the command API for the desktop GUI
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// List attached scanners
    Scanners,
    /// Scan one page and suggest a name for it
    Scan,
    /// Suggest a filename for an existing image
    Suggest { image: PathBuf },
    /// Upload a file to Paperless-ngx
    Upload {
        file: PathBuf,
        /// Name to derive the document title from
        #[arg(long)]
        name: Option<String>,
    },
    /// Inspect or edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Get { key: String },
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,paperscan=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();
    if let Some(path) = cli.config {
        config.settings_path = path;
    }

    match run(cli.command.unwrap_or(Command::Serve { port: None }), config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            tracing::info!("paperscan starting...");
            tracing::info!("Settings file: {}", config.settings_path.display());
            tracing::info!("OpenAI model: {}", config.openai_model);
            tracing::info!("Gemini model: {}", config.gemini_model);
            match &config.gui_origin {
                Some(origin) => tracing::info!("GUI origin: {}", origin),
                None => tracing::info!("No GUI origin set, cross-origin calls are refused"),
            }

            let shell = Arc::new(Shell::new(&config).await);
            let addr = format!("127.0.0.1:{}", config.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Command API running at http://{}", addr);
            paperscan::serve(listener, shell, config.gui_origin.as_deref()).await?;
        }
        Command::Scanners => {
            let shell = Shell::new(&config).await;
            for name in shell.list_scanners().await? {
                println!("{}", name);
            }
        }
        Command::Scan => {
            let shell = Shell::new(&config).await;
            match shell.scan().await? {
                ScanOutcome::Scanned { image, suggestion } => {
                    println!("{}", image.display());
                    if !suggestion.is_empty() {
                        println!("suggested name: {}", suggestion);
                    }
                }
                ScanOutcome::Cancelled => println!("scan cancelled"),
            }
        }
        Command::Suggest { image } => {
            let shell = Shell::new(&config).await;
            let name = shell.suggest(&image).await;
            if name.is_empty() {
                tracing::warn!("No suggestion available");
            } else {
                println!("{}", name);
            }
        }
        Command::Upload { file, name } => {
            let shell = Shell::new(&config).await;
            let result = shell.upload_file(&file, name.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                return Err("upload failed".into());
            }
        }
        Command::Config { action } => {
            let store = paperscan::settings::ConfigStore::new(&config.settings_path);
            match action {
                ConfigAction::Show => {
                    let settings = store.load().ok_or("settings file could not be read")?;
                    print!("{}", serde_yaml::to_string(&settings)?);
                }
                ConfigAction::Get { key } => match store.get_value(&key) {
                    Some(value) => println!("{}", value),
                    None => return Err(format!("{} is not set", key).into()),
                },
                ConfigAction::Set { key, value } => store.set_value(&key, value)?,
            }
        }
    }
    Ok(())
}

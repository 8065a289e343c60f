use anyhow::Result;
use clap::{Parser, Subcommand};
use pdf_assistant::agents::DEFAULT_SESSION;
use pdf_assistant::commands::{
    ask, ingest_files, init_config, load_config, serve, show_config, show_status,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-assistant")]
#[command(about = "Chat with your PDFs by text or voice, backed by a local Ollama server")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector index
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured bind port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Extract, chunk and index PDF files
    Ingest {
        /// PDF files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Conversation session to answer within
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },
    /// Write a default config.toml, or show the current configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Check Ollama, the vector index and credentials
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir)?;

    match cli.command {
        Commands::Serve { host, port } => {
            serve(config, host, port).await?;
        }
        Commands::Ingest { files } => {
            ingest_files(&config, &files).await?;
        }
        Commands::Ask { question, session } => {
            ask(&config, &question, &session).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config);
            } else if init_config(&config)? {
                println!(
                    "Wrote default configuration to {}",
                    config.config_file_path().display()
                );
            } else {
                println!(
                    "Configuration already exists at {}; edit it to change settings.",
                    config.config_file_path().display()
                );
            }
        }
        Commands::Status => {
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn serve_command() {
        let cli = Cli::try_parse_from(["pdf-assistant", "serve"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(
                parsed.command,
                Commands::Serve {
                    host: None,
                    port: None
                }
            ));
        }
    }

    #[test]
    fn serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "pdf-assistant",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { host, port } = parsed.command {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
        }
    }

    #[test]
    fn ingest_requires_files() {
        let cli = Cli::try_parse_from(["pdf-assistant", "ingest"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ingest_several_files() {
        let cli = Cli::try_parse_from(["pdf-assistant", "ingest", "a.pdf", "b.pdf"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { files } = parsed.command {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
            }
        }
    }

    #[test]
    fn ask_uses_default_session() {
        let cli = Cli::try_parse_from(["pdf-assistant", "ask", "What is Rust?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, session } = parsed.command {
                assert_eq!(question, "What is Rust?");
                assert_eq!(session, "default");
            }
        }
    }

    #[test]
    fn global_config_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["pdf-assistant", "status", "--config-dir", "/tmp/pa"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/pa")));
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["pdf-assistant", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn config_without_flag_writes_defaults() {
        let cli = Cli::try_parse_from(["pdf-assistant", "config"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: false }));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["pdf-assistant", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }
}

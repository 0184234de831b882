//! tts-converter-rs: text-to-speech converter with a bounded conversion history.

mod api;
mod config;
mod error;
mod history;
mod languages;
mod service;
mod speech;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::service::{ConversionRequest, ConversionService};

#[derive(Parser, Debug)]
#[command(name = "tts-converter-rs", about = "Text-to-speech converter")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web page and JSON API (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Convert text to an MP3 file
    Convert {
        /// Text to speak
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Language code (see `languages`)
        #[arg(short, long)]
        language: Option<String>,

        /// Slow speech
        #[arg(long)]
        slow: bool,

        /// Speak the text as-is even for non-source languages
        #[arg(long)]
        no_translate: bool,

        /// Output path (default: tts_output_<timestamp>.mp3)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Play the result after writing it
        #[arg(long)]
        play: bool,
    },
    /// Show recent conversions
    History {
        /// Number of records to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print a Markdown report instead of a list
        #[arg(long)]
        report: bool,
    },
    /// List supported languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info,symphonia=warn")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn,symphonia=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::load(args.config.as_deref());

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            let service = Arc::new(ConversionService::from_config(&config)?);
            let state = api::ApiState {
                service,
                display_count: config.history.display_count,
            };
            let port = port.unwrap_or(config.server.port);
            api::serve(state, &config.server.host, port).await?;
        }
        Command::Convert {
            text,
            file,
            language,
            slow,
            no_translate,
            output,
            play,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)?,
                (None, None) => return Err("no text given".into()),
            };

            let service = ConversionService::from_config(&config)?;
            let language = language.unwrap_or_else(|| config.tts.default_language.clone());
            let mut request = ConversionRequest::new(text, language);
            if slow {
                request.speed = 0.5;
            }
            if no_translate {
                request.translate = Some(false);
            }
            let conversion = service.convert(request).await?;
            for warning in &conversion.warnings {
                warn!("{warning}");
            }

            let path = output.unwrap_or_else(|| PathBuf::from(&conversion.filename));
            std::fs::write(&path, &conversion.audio)?;
            info!(
                "Wrote {} ({} bytes, {})",
                path.display(),
                conversion.audio.len(),
                languages::display_name(&conversion.language)
            );
            if conversion.translated {
                println!("{}", conversion.text_spoken);
            }
            println!("{}", path.display());

            if play {
                speech::playback::play_mp3(conversion.audio).await?;
            }
        }
        Command::History { limit, report } => {
            let ledger = config.history.open_ledger();
            let records = ledger.recent(limit.unwrap_or(config.history.display_count));
            if report {
                println!("{}", history::generate_report(&records));
            } else if records.is_empty() {
                println!("No conversion history yet");
            } else {
                for r in &records {
                    println!("{} - {}\n  {}", r.timestamp, r.language_name(), r.text);
                }
            }
        }
        Command::Languages => {
            for lang in languages::all() {
                println!("{:<4} {}", lang.code, lang.name);
            }
        }
    }

    Ok(())
}

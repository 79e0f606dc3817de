use clap::{Parser, Subcommand};
use lib::backend::has_pdf_extension;
use lib::conversation::{Conversation, LogMark, UploadStatus};
use lib::init::Profile;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Docent CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: DOCENT_CONFIG_PATH or ~/.docent/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the session id sent with every question (created on first use).
    Session {
        /// Config file path (default: DOCENT_CONFIG_PATH or ~/.docent/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Upload a PDF to the backend for indexing.
    Upload {
        /// PDF file to upload.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Config file path (default: DOCENT_CONFIG_PATH or ~/.docent/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Ask a single question and print the reply and reasoning.
    Ask {
        /// The question.
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Print transcript and reasoning log as JSON.
        #[arg(long)]
        json: bool,

        /// Config file path (default: DOCENT_CONFIG_PATH or ~/.docent/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat about the uploaded document (interactive). Type /help for commands.
    Chat {
        /// Config file path (default: DOCENT_CONFIG_PATH or ~/.docent/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("docent {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Init { config }) => run_init(config),
        Some(Commands::Session { config }) => run_session(config),
        Some(Commands::Upload { file, config }) => run_upload(config, file).await,
        Some(Commands::Ask {
            question,
            json,
            config,
        }) => run_ask(config, question, json).await,
        Some(Commands::Chat { config }) => run_chat(config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn run_session(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let profile = Profile::open(config_path)?;
    println!("{}", profile.identity.id());
    if !profile.identity.is_persisted() {
        eprintln!(
            "warning: session id could not be saved to {}",
            profile.storage_path.display()
        );
    }
    Ok(())
}

async fn run_upload(config_path: Option<PathBuf>, file: PathBuf) -> anyhow::Result<()> {
    let profile = Profile::open(config_path)?;
    let mut convo = profile.conversation();
    match upload_file(&profile, &mut convo, &file).await {
        Some(UploadStatus::Uploaded(_)) => Ok(()),
        Some(UploadStatus::Error(reason)) => anyhow::bail!("upload failed: {}", reason),
        _ => anyhow::bail!("upload did not run"),
    }
}

async fn run_ask(config_path: Option<PathBuf>, question: String, json: bool) -> anyhow::Result<()> {
    let profile = Profile::open(config_path)?;
    let mut convo = profile.conversation();
    let mark = convo.reasoning_log().mark();
    convo.send_message(&profile.backend, &question).await?;
    if json {
        let out = serde_json::json!({
            "sessionId": convo.session_id(),
            "transcript": convo.transcript().entries(),
            "reasoningLog": convo.reasoning_log().entries(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_new(&convo, 0, mark);
    }
    Ok(())
}

/// Upload with PDF filtering and status printing; `None` when the file was refused.
async fn upload_file(profile: &Profile, convo: &mut Conversation, file: &Path) -> Option<UploadStatus> {
    if !has_pdf_extension(file) {
        eprintln!("only PDF files can be uploaded: {}", file.display());
        return None;
    }
    let mut print_status = |s: &UploadStatus| println!("[upload] {}", s);
    match convo.upload(&profile.backend, file, &mut print_status).await {
        Ok(status) => Some(status),
        Err(e) => {
            eprintln!("{}", e);
            None
        }
    }
}

/// Print reasoning entries added since `log_mark` and transcript entries from `transcript_from`.
fn print_new(convo: &Conversation, transcript_from: usize, log_mark: LogMark) {
    for line in convo.reasoning_log().since(log_mark) {
        println!("  · {}", line);
    }
    for line in convo.transcript().entries().iter().skip(transcript_from) {
        println!("{}", line);
    }
}

const CHAT_HELP: &str = "available commands:\n\n/upload <file.pdf> - upload a document\n/log - show the full reasoning log\n/help - show this help message\n/exit, /quit - leave";

async fn run_chat(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let profile = Profile::open(config_path)?;
    let mut convo = profile.conversation();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    println!(
        "docent {} (backend {}, session {})",
        env!("CARGO_PKG_VERSION"),
        profile.backend.base_url(),
        profile.identity.id()
    );

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim_end_matches(['\r', '\n']);
        let command = input.trim();
        if command.is_empty() {
            continue;
        }
        if command.eq_ignore_ascii_case("/exit") || command.eq_ignore_ascii_case("/quit") {
            break;
        }
        if command.eq_ignore_ascii_case("/help") {
            println!("{}", CHAT_HELP);
            continue;
        }
        if command.eq_ignore_ascii_case("/log") {
            for l in convo.reasoning_log().entries() {
                println!("  · {}", l);
            }
            continue;
        }
        if let Some(rest) = command.strip_prefix("/upload") {
            let path = rest.trim();
            if path.is_empty() {
                eprintln!("usage: /upload <file.pdf>");
                continue;
            }
            upload_file(&profile, &mut convo, Path::new(path)).await;
            continue;
        }

        let (t_from, l_mark) = (convo.transcript().len(), convo.reasoning_log().mark());
        if let Err(e) = convo.send_message(&profile.backend, input).await {
            eprintln!("{}", e);
            continue;
        }
        // Skip the local echo of the question; the user just typed it.
        print_new(&convo, t_from + 1, l_mark);
    }

    Ok(())
}

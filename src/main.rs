use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trident::integration::{build_session, ConversationEvent, IntegrationConfig, Session, StreamState};
use trident::speech::{CaptureMode, DispatchMode, Language};

const DEFAULT_HISTORY: &str = "data/HISTORY.json";

/// Talk to a language model in Ukrainian or English and hear it answer
#[derive(Parser, Debug)]
#[command(name = "trident", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Load the previous conversation and save this one on exit
    #[arg(long, global = true)]
    memory: bool,

    /// History file used with --memory
    #[arg(long, global = true, value_name = "PATH")]
    history: Option<PathBuf>,

    /// Print replies without speaking them
    #[arg(long, global = true)]
    mute: bool,

    /// Speak replies from a queue while the model keeps streaming
    #[arg(long, global = true, value_name = "CAPACITY", num_args = 0..=1, default_missing_value = "4")]
    queued: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Type prompts on stdin (default)
    Chat,

    /// Talk through the microphone
    Listen {
        /// Language of your speech: ua, en or auto
        #[arg(long)]
        mode: Option<CaptureMode>,
    },

    /// Answer one recorded prompt
    File {
        /// WAV recording of the prompt
        wav: PathBuf,

        /// Language of the recording: ua, en or auto
        #[arg(long)]
        mode: Option<CaptureMode>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so the transcript on stdout stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trident=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Chat);

    let mut config = IntegrationConfig::load_or_default(cli.config.as_deref())?;
    if cli.memory || cli.history.is_some() {
        let path = cli
            .history
            .or_else(|| config.history_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY));
        if !path.exists() {
            println!(
                "No previous history is available, creating new one.\tПопередньої розмови не знайдено, створюю розмову."
            );
        }
        config.history_path = Some(path);
    }
    if cli.mute {
        config.enable_audio_output = false;
    }
    if let Some(capacity) = cli.queued {
        config.dispatch = DispatchMode::Queued { capacity };
    }
    config.enable_audio_input = !matches!(command, Command::Chat);
    config.validate()?;

    info!("Starting trident");

    let (event_tx, event_rx) = unbounded();
    let (done_tx, done_rx) = unbounded();
    std::thread::Builder::new()
        .name("transcript".to_string())
        .spawn(move || print_events(event_rx, done_tx))
        .context("Failed to start transcript printer")?;

    let session = Arc::new(build_session(&config, Some(event_tx))?);

    let handler_session = Arc::clone(&session);
    ctrlc::set_handler(move || {
        if handler_session.is_streaming() {
            handler_session.stop();
            return;
        }
        println!("\nStopped listening.\t Перервано.");
        if let Err(e) = handler_session.save() {
            warn!("Failed to save history: {}", e);
        }
        std::process::exit(0);
    })
    .context("Error setting Ctrl-C handler")?;

    let turns = Turns { session: &session, done: done_rx };
    match command {
        Command::Chat => chat(&turns)?,
        Command::Listen { mode } => listen(&turns, &config, mode.unwrap_or(config.capture_mode))?,
        Command::File { wav, mode } => {
            let audio = trident::audio::read_wav(&wav)
                .with_context(|| format!("Failed to read {}", wav.display()))?;
            println!("Working on it...\t Обробка...");
            turns.submit(|s| s.submit_audio(&audio, mode.unwrap_or(config.capture_mode)))?;
        }
    }

    session.save()?;
    Ok(())
}

/// Runs turns and waits until the transcript printer has caught up
struct Turns<'a> {
    session: &'a Session,
    done: Receiver<()>,
}

impl Turns<'_> {
    /// Errors that lose only the turn are reported; the rest end the session
    fn submit<F>(&self, turn: F) -> Result<()>
    where
        F: FnOnce(&Session) -> trident::Result<trident::integration::TurnReport>,
    {
        let result = turn(self.session);
        let _ = self.done.recv_timeout(Duration::from_secs(1));
        match result {
            Ok(_) | Err(trident::TridentError::TranscriptionError(_)) => Ok(()),
            Err(e) if e.is_recoverable() => {
                eprintln!("{}", e.user_message());
                Ok(())
            }
            Err(e) => {
                eprintln!("{}", e.user_message());
                Err(e.into())
            }
        }
    }
}

fn chat(turns: &Turns) -> Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                turns.session.reset();
                continue;
            }
            text => turns.submit(|s| s.submit_text(text))?,
        }
    }
    Ok(())
}

#[cfg(feature = "audio-io")]
fn listen(turns: &Turns, config: &IntegrationConfig, mode: CaptureMode) -> Result<()> {
    use trident::audio::MicrophoneRecorder;
    use trident::utils::StopSignal;

    let recorder = MicrophoneRecorder::new(config.capture.clone())?;
    // Ctrl-C while listening exits the process, so this never fires
    let idle = StopSignal::new();
    loop {
        println!("Listening...\t\t Слухаю...");
        let audio = match recorder.listen(&idle)? {
            Some(audio) => audio,
            None => continue,
        };
        println!("Working on it...\t Обробка...");
        turns.submit(|s| s.submit_audio(&audio, mode))?;
    }
}

#[cfg(not(feature = "audio-io"))]
fn listen(_turns: &Turns, _config: &IntegrationConfig, _mode: CaptureMode) -> Result<()> {
    anyhow::bail!("This build has no microphone support; rebuild with --features audio-io")
}

fn print_events(events: Receiver<ConversationEvent>, done: Sender<()>) {
    let mut stdout = std::io::stdout();
    for event in events {
        match event {
            ConversationEvent::UserTurn { prompt, .. } => {
                let label = match prompt.tag {
                    Language::Ua => "Користувач",
                    Language::En => "User",
                };
                let _ = writeln!(stdout, "{}: {}", label, prompt.text);
            }
            ConversationEvent::StateChanged {
                state: StreamState::Streaming,
                ..
            } => {
                let _ = write!(stdout, "Assistant: ");
            }
            ConversationEvent::Token { text, .. } => {
                let _ = write!(stdout, "{}", text);
            }
            ConversationEvent::TurnFinished(report) => {
                if report.state == StreamState::Cancelled {
                    let _ = write!(stdout, " [...]");
                }
                let _ = writeln!(stdout, "\n");
                let _ = done.send(());
            }
            ConversationEvent::TranscriptionFailed { .. } => {
                let _ = writeln!(stdout, "Didn't recognize that.\t\t Не зрозуміла.");
                let _ = done.send(());
            }
            ConversationEvent::SpeechFailed { .. }
            | ConversationEvent::Speaking { .. }
            | ConversationEvent::StateChanged { .. } => {}
        }
        let _ = stdout.flush();
    }
}

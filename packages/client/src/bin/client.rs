//! Parley terminal client.
//!
//! Connects to a signaling server (discovered on the local network when no
//! URL is given), keeps the connection alive, and drives meetings from slash
//! commands. Plain text is sent as chat to the current meeting, or to
//! everyone when not in a meeting.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin parley-client -- --user alice
//! cargo run --bin parley-client -- -u bob --url ws://192.168.1.10:8887/ws
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use parley_client::{
    command::{Command, HELP, parse_command},
    connection::{
        FallbackDecision, FallbackOutcome, ResilienceConfig, ResilienceManager, SignalSender,
        StatusListener,
    },
    error::Recovery,
    formatter::{MessageFormatter, redisplay_prompt},
    meeting::{
        CoordinatorConfig, InMemoryMeetingStore, MeetingCoordinator, MeetingEvent, MeetingId,
        MeetingListener,
    },
};
use parley_shared::{logger::setup_logger, protocol::FIELD_DELIMITER, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "parley-client")]
#[command(about = "Parley signaling client with automatic reconnection", long_about = None)]
struct Args {
    /// Username shown to other participants
    #[arg(short = 'u', long)]
    user: String,

    /// Signaling server URL (scans the local network when omitted)
    #[arg(long)]
    url: Option<String>,

    /// Seconds between connection checks
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Failed checks before asking how to recover
    #[arg(long, default_value_t = 2)]
    failure_threshold: u32,
}

/// Prints status changes and meeting events above the prompt
struct TerminalListener {
    username: String,
}

impl StatusListener for TerminalListener {
    fn on_connection_status_changed(&self, connected: bool, message: &str) {
        print!(
            "{}",
            MessageFormatter::format_connection_status(connected, message)
        );
        redisplay_prompt(&self.username);
    }

    fn on_fallback_required(&self, url: Option<&str>, failures: u32) {
        print!("{}", MessageFormatter::format_fallback_prompt(url, failures));
        redisplay_prompt(&self.username);
    }
}

impl MeetingListener for TerminalListener {
    fn on_meeting_event(&self, event: &MeetingEvent) {
        print!("{}", MessageFormatter::format_event(event, &self.username));
        redisplay_prompt(&self.username);
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let username = args.user.trim().to_string();
    if username.is_empty() || username.contains(FIELD_DELIMITER) {
        return Err(format!("invalid username '{}'", args.user).into());
    }

    let config = ResilienceConfig {
        poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        failure_threshold: args.failure_threshold,
        ..ResilienceConfig::default()
    };

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let manager = Arc::new(ResilienceManager::new(config, inbound_tx));
    let listener = Arc::new(TerminalListener {
        username: username.clone(),
    });
    manager.set_status_listener(listener.clone());

    let coordinator = Arc::new(MeetingCoordinator::new(
        username.clone(),
        manager.clone(),
        Arc::new(InMemoryMeetingStore::new()),
        Arc::new(SystemClock),
        CoordinatorConfig::default(),
    ));
    coordinator.add_listener(listener);

    match args.url {
        Some(url) => {
            if let Err(e) = manager.connect(&url).await {
                tracing::warn!("Initial connection failed, retrying in background: {}", e);
            }
        }
        None => {
            println!("Looking for a signaling server on the local network...");
            match manager.apply_fallback(FallbackDecision::Rediscover).await {
                Ok(FallbackOutcome::Connected(url)) => tracing::info!("Using {}", url),
                Ok(FallbackOutcome::Candidates(candidates)) => {
                    print!("{}", MessageFormatter::format_candidates(&candidates))
                }
                _ => run_fallback(&manager, FallbackDecision::CanonicalLocal).await,
            }
        }
    }

    let inbound_coordinator = coordinator.clone();
    let inbound_task = tokio::spawn(async move {
        while let Some(frame) = inbound_rx.recv().await {
            inbound_coordinator.handle_frame(frame).await;
        }
    });

    println!(
        "\nYou are '{}'. Type /help for commands, plain text to chat. Ctrl+D to exit.\n",
        username
    );

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt = format!("{}> ", username);
    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    while let Some(line) = input_rx.recv().await {
        if !execute(parse_command(&line), &manager, &coordinator).await {
            break;
        }
    }

    if coordinator.active_meeting().await.is_some() {
        let _ = coordinator.leave_meeting().await;
    }
    manager.stop().await;
    inbound_task.abort();
    tracing::info!("Client stopped");

    Ok(())
}

/// Run one command; `false` means quit
async fn execute(
    command: Command,
    manager: &ResilienceManager,
    coordinator: &MeetingCoordinator,
) -> bool {
    match command {
        Command::Chat(text) => {
            if let Err(e) = coordinator.send_chat(&text).await {
                println!("Message not sent: {}", e);
            }
        }
        Command::Create(requested) => {
            let created = match requested {
                Some(meeting_id) => match MeetingId::parse(&meeting_id) {
                    Ok(meeting_id) => coordinator.create_meeting_with_id(meeting_id).await,
                    Err(e) => Err(e),
                },
                None => coordinator.create_meeting().await,
            };
            match created {
                Ok(info) => println!("Share meeting ID {} with participants", info.meeting_id),
                Err(e) => println!("{}", e),
            }
        }
        Command::Join(meeting_id) => {
            if let Err(e) = coordinator.join_meeting(&meeting_id).await {
                println!("{}", e);
                if let Some(recovery) = e.recovery() {
                    println!("{}", recovery_hint(&recovery));
                }
            }
        }
        Command::Leave => {
            if let Err(e) = coordinator.leave_meeting().await {
                println!("{}", e);
            }
        }
        Command::Validate(meeting_id) => match coordinator.validate_meeting(&meeting_id).await {
            Ok(true) => println!("Meeting {} exists", meeting_id.trim()),
            Ok(false) => println!("Meeting {} was not found", meeting_id.trim()),
            Err(e) => println!("{}", e),
        },
        Command::Mute => {
            coordinator.toggle_audio().await;
        }
        Command::Video => {
            coordinator.toggle_video().await;
        }
        Command::Record => {
            coordinator.toggle_recording().await;
        }
        Command::Deafen => {
            coordinator.toggle_deafen().await;
        }
        Command::MuteAll => {
            if let Err(e) = coordinator.toggle_mute_all().await {
                println!("{}", e);
            }
        }
        Command::Status => print_status(manager, coordinator).await,
        Command::Discover => run_fallback(manager, FallbackDecision::Rediscover).await,
        Command::Connect(address) => {
            run_fallback(manager, FallbackDecision::Manual(address)).await
        }
        Command::Localhost => run_fallback(manager, FallbackDecision::CanonicalLocal).await,
        Command::Retry => run_fallback(manager, FallbackDecision::KeepRetrying).await,
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
        Command::Invalid(message) => println!("{}", message),
    }
    true
}

fn recovery_hint(recovery: &Recovery) -> String {
    match recovery {
        Recovery::CreateMeeting(meeting_id) => {
            format!("Use /create {} to start it yourself", meeting_id)
        }
    }
}

async fn run_fallback(manager: &ResilienceManager, decision: FallbackDecision) {
    match manager.apply_fallback(decision).await {
        Ok(FallbackOutcome::Connected(url)) => tracing::info!("Using {}", url),
        Ok(FallbackOutcome::Candidates(candidates)) => {
            print!("{}", MessageFormatter::format_candidates(&candidates))
        }
        Ok(FallbackOutcome::NoneFound { local_addrs }) => {
            print!("{}", MessageFormatter::format_no_servers(&local_addrs))
        }
        Ok(FallbackOutcome::Resumed) => println!("Retrying automatically"),
        Err(e) => println!("{}", e),
    }
}

async fn print_status(manager: &ResilienceManager, coordinator: &MeetingCoordinator) {
    println!(
        "Connection: {} ({})",
        manager.state(),
        manager.current_url().unwrap_or_else(|| "no server".to_string())
    );
    if let Some(reason) = manager.last_error() {
        println!("Last error: {}", reason);
    }
    match coordinator.active_meeting().await {
        Some((info, role)) => print!(
            "{}",
            MessageFormatter::format_meeting_summary(&info, role, coordinator.username())
        ),
        None => println!("Not in a meeting"),
    }
    print!(
        "{}",
        MessageFormatter::format_controls(&coordinator.controls().await)
    );
    if !manager.is_connected() {
        println!("Messages will not be sent until the connection is back");
    }
}

//! walkie: terminal front end for a push-to-talk channel session.
//!
//! Connects to the signaling relay, optionally joins a channel, and reads
//! line commands from stdin while printing session changes. There is no
//! audio backend: the binary tracks membership and talk state only.

mod cli;
mod commands;
mod setup;

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use walkie_config::WalkieConfig;
use walkie_session::{SessionEvent, SessionHandle, SessionSnapshot, WebSocketLink};

use crate::commands::Command;

fn init_logging(directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                directive
                    .parse()
                    .unwrap_or_else(|_| LevelFilter::INFO.into()),
            ),
        )
        .init();
}

#[tokio::main]
async fn main() -> walkie_common::Result<()> {
    let args = cli::parse();

    let loaded = match &args.config {
        Some(path) => walkie_config::load_config_from(Path::new(path)),
        None => walkie_config::load_config(),
    };
    if args.print_config {
        println!("{}", walkie_config::config_to_json(&loaded?));
        return Ok(());
    }
    let config_error = loaded.as_ref().err().map(ToString::to_string);
    let config = loaded.unwrap_or_default();

    let directive = match &args.log_level {
        Some(level) => format!("walkie={level}"),
        None => format!("walkie={}", config.logging.level.as_directive()),
    };
    init_logging(&directive);

    tracing::info!("walkie v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    let result = run(args, config).await;
    tracing::info!("Shutdown complete");
    result
}

async fn run(args: cli::Args, config: WalkieConfig) -> walkie_common::Result<()> {
    let link_config = setup::link_config(&config, args.server.as_deref());
    tracing::info!(url = %link_config.url, "Using signaling relay");

    let (link, link_events) = WebSocketLink::connect(link_config);
    let (session, mut events) = SessionHandle::spawn(
        setup::session_config(&config),
        Arc::new(link),
        link_events,
        Box::new(setup::NoPeerEngine),
        Arc::new(setup::NoCapture::new(config.audio.input_device.clone())),
    );

    // Joined as soon as the relay assigns an identity.
    let mut pending_join = args
        .channel
        .clone()
        .or_else(|| config.channel.default_channel().map(str::to_string));

    let mut snapshots = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", commands::HELP);

    let mut outcome = Ok(());
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match commands::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = execute(&session, command).await {
                            println!("error: {e}");
                        }
                    }
                    Err(e) => println!("{e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    outcome = Err(e.into());
                    break;
                }
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.local_id.is_some() {
                    if let Some(channel) = pending_join.take() {
                        if let Err(e) = session.join(channel.as_str()).await {
                            println!("join failed: {e}");
                        }
                    }
                }
            },
            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.destroy().await;
    outcome
}

async fn execute(session: &SessionHandle, command: Command) -> walkie_common::Result<()> {
    match command {
        Command::Join(channel) => session.change_channel(channel.as_str()).await?,
        Command::Talk => session.start_talking().await?,
        Command::Stop => session.stop_talking().await?,
        Command::RetryMic => session.reacquire_stream().await?,
        Command::Status => print_snapshot(&session.snapshot()),
        Command::Help => println!("{}", commands::HELP),
        Command::Quit => {}
    }
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged { to, .. } => println!("[{to}]"),
        SessionEvent::ParticipantJoined { participant } => println!("+ {participant}"),
        SessionEvent::ParticipantLeft { participant } => println!("- {participant}"),
        SessionEvent::TalkingChanged {
            participant,
            talking: true,
        } => println!("{participant} is talking"),
        SessionEvent::TalkingChanged {
            participant,
            talking: false,
        } => println!("{participant} stopped talking"),
        SessionEvent::LocalTalkingChanged { talking } => {
            println!("{}", if *talking { "(transmitting)" } else { "(idle)" })
        }
        SessionEvent::RemoteStream { from, .. } => println!("receiving audio from {from}"),
        SessionEvent::Error(message) => println!("error: {message}"),
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let channel = snapshot
        .channel
        .as_ref()
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    let local = snapshot
        .local_id
        .as_ref()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    let join = |ids: &[walkie_common::ParticipantId]| {
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("state:    {}", snapshot.state);
    println!("channel:  {channel}");
    println!("you:      {local}");
    println!("peers:    {}", join(&snapshot.roster));
    println!("talking:  {}", join(&snapshot.talking));
    if snapshot.capture_blocked {
        println!("mic:      unavailable (type 'mic' to retry)");
    }
    if let Some(status) = &snapshot.status {
        println!("status:   {status}");
    }
    if let Some(error) = &snapshot.last_error {
        println!("last error: {error}");
    }
}

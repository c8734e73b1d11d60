//! Intervox console host.
//!
//! Runs one interview session against the configured service. There is no
//! audio device here: speech output is printed and paced by the console
//! synthesizer, and `/say <text>` stands in for the microphone.

mod console;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use intervox_core::speech::stub::{stub_capabilities, FixedPermission};
use intervox_core::{HttpInterviewApi, SessionCommand, SessionController, SessionEvent, SessionPhase};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use console::ConsoleCommand;
use settings::{apply_env_overrides, default_settings_path, load_settings, save_settings};

const DEFAULT_LOG_FILTER: &str = "intervox=info,intervox_core=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = default_settings_path();
    let mut settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!(path = %settings_path.display(), "could not write default settings: {e}");
        }
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.normalize();
    info!(
        path = %settings_path.display(),
        api = %settings.api_base_url,
        user_id = %settings.user_id,
        "Intervox starting"
    );

    // ── Session ───────────────────────────────────────────────────────────
    let api = HttpInterviewApi::new(settings.api_base_url.clone())
        .context("failed to create interview service client")?;
    let permission = if settings.microphone_allowed {
        FixedPermission::granted()
    } else {
        FixedPermission::denied()
    };
    let pace = Duration::from_millis(settings.speech_ms_per_word);
    let (capabilities, remotes) = stub_capabilities(permission, Some(pace));

    let controller = SessionController::new(settings.session_config(), Arc::new(api), capabilities)
        .with_end_hook(|summary| {
            info!(
                questions = summary.questions_asked,
                elapsed_seconds = summary.elapsed_seconds,
                "interview finished"
            );
            println!(
                "Interview finished: {} question(s) in {}.",
                summary.questions_asked,
                intervox_core::status::format_elapsed(summary.elapsed_seconds)
            );
        });
    let (handle, session_task) = controller.spawn();
    let printer = tokio::spawn(print_events(handle.subscribe()));

    println!("{}", console::HELP);
    handle.start()?;

    // ── Console loop ──────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let Some(command) = console::parse(&line, &settings.push_to_talk_key) else {
            continue;
        };
        match command {
            ConsoleCommand::Session(SessionCommand::End) => break,
            ConsoleCommand::Session(command) => handle.send(command)?,
            ConsoleCommand::Dictate(text) => {
                if remotes.recognizer.is_running() {
                    remotes.recognizer.dictate(&text);
                } else {
                    println!("microphone is not listening (use /hold or /mic first)");
                }
            }
            ConsoleCommand::Status => println!("{}", console::render_status(&handle.snapshot())),
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Unknown(raw) => println!("unknown command: {raw} (try /help)"),
        }
        if handle.snapshot().phase == SessionPhase::Ended {
            break;
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────
    handle.end()?;
    drop(handle);
    session_task.await.context("session task failed")?;
    if let Err(e) = printer.await {
        warn!("event printer stopped abnormally: {e}");
    }
    info!("Intervox exiting");
    Ok(())
}

async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = console::render_event(&event) {
                    println!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

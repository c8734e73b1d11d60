//! Line-oriented console surface: stdin lines in, session events out.

use intervox_core::events::NoticeLevel;
use intervox_core::status::{format_elapsed, progress_percent};
use intervox_core::{
    AnswerSource, FocusTarget, KeyEvent, SessionCommand, SessionEvent, SessionSnapshot, SpeechState,
};

pub const HELP: &str = "\
commands:
  /hold            press the push-to-talk key
  /release         release the push-to-talk key
  /mic             toggle the microphone button
  /say <text>      speak <text> into the microphone
  /draft <text>    replace the typed answer draft
  /send            submit the typed draft
  /stop-voice      stop the interviewer's voice
  /reset-mic       clear a microphone error
  /retry           retry loading the first question
  /status          show the session status
  /end             finish the interview
  anything else    submit as a typed answer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Session(SessionCommand),
    /// Feed a final recognition result to the console recognizer.
    Dictate(String),
    Status,
    Help,
    Unknown(String),
}

/// Parse one stdin line. Blank lines yield `None`.
pub fn parse(line: &str, ptt_key: &str) -> Option<ConsoleCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ConsoleCommand::Session(SessionCommand::Submit {
            text: line.to_string(),
            source: AnswerSource::Typed,
        }));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let key = || KeyEvent::new(ptt_key, FocusTarget::Other);
    let command = match name {
        "hold" => ConsoleCommand::Session(SessionCommand::KeyDown(key())),
        "release" => ConsoleCommand::Session(SessionCommand::KeyUp(key())),
        "mic" => ConsoleCommand::Session(SessionCommand::ToggleMic),
        "say" if !arg.is_empty() => ConsoleCommand::Dictate(arg.to_string()),
        "draft" => ConsoleCommand::Session(SessionCommand::UpdateDraft(arg.to_string())),
        "send" => ConsoleCommand::Session(SessionCommand::SubmitDraft),
        "stop-voice" => ConsoleCommand::Session(SessionCommand::StopSpeaking),
        "reset-mic" => ConsoleCommand::Session(SessionCommand::ResetMic),
        "retry" => ConsoleCommand::Session(SessionCommand::RetryOpeningQuestion),
        "status" => ConsoleCommand::Status,
        "end" => ConsoleCommand::Session(SessionCommand::End),
        "help" | "?" => ConsoleCommand::Help,
        _ => ConsoleCommand::Unknown(line.to_string()),
    };
    Some(command)
}

/// One printable line per event worth showing. Ticks are silent.
pub fn render_event(event: &SessionEvent) -> Option<String> {
    let line = match event {
        SessionEvent::QuestionChanged { question } => {
            format!("Q{}: {}", question.ordinal, question.text)
        }
        SessionEvent::SpeechChanged {
            speech: SpeechState::Speaking,
        } => "(interviewer speaking...)".into(),
        SessionEvent::Transcript { text } => format!("you said: {text}"),
        SessionEvent::AnswerAccepted { source, chars } => {
            format!("answer sent ({source:?}, {chars} chars)")
        }
        SessionEvent::Notice { level, message } => match level {
            NoticeLevel::Info => message.clone(),
            NoticeLevel::Warning => format!("warning: {message}"),
            NoticeLevel::Error => format!("error: {message}"),
        },
        SessionEvent::MicChanged { mic } => format!("mic: {mic:?}"),
        _ => return None,
    };
    Some(line)
}

pub fn render_status(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "[{}] {:?} | question {} | progress {}% | {}",
        format_elapsed(snapshot.elapsed_seconds),
        snapshot.phase,
        snapshot.question_index,
        progress_percent(snapshot.question_index),
        snapshot.control.label(),
    );
    if let Some(question) = &snapshot.question {
        out.push_str(&format!("\n  Q{}: {}", question.ordinal, question.text));
    }
    if !snapshot.draft.is_empty() {
        out.push_str(&format!("\n  draft: {}", snapshot.draft));
    }
    out
}

#[cfg(test)]
mod tests {
    use intervox_core::Question;

    use super::*;

    #[test]
    fn plain_lines_are_typed_answers() {
        assert_eq!(
            parse("  I like Rust  ", "Space"),
            Some(ConsoleCommand::Session(SessionCommand::Submit {
                text: "I like Rust".into(),
                source: AnswerSource::Typed,
            }))
        );
        assert_eq!(parse("   ", "Space"), None);
    }

    #[test]
    fn hold_and_release_use_the_configured_key() {
        assert_eq!(
            parse("/hold", "F8"),
            Some(ConsoleCommand::Session(SessionCommand::KeyDown(KeyEvent::new(
                "F8",
                FocusTarget::Other
            ))))
        );
        assert_eq!(
            parse("/release", "F8"),
            Some(ConsoleCommand::Session(SessionCommand::KeyUp(KeyEvent::new(
                "F8",
                FocusTarget::Other
            ))))
        );
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            parse("/say  hello there ", "Space"),
            Some(ConsoleCommand::Dictate("hello there".into()))
        );
        assert_eq!(
            parse("/draft my answer", "Space"),
            Some(ConsoleCommand::Session(SessionCommand::UpdateDraft("my answer".into())))
        );
        assert_eq!(parse("/say", "Space"), Some(ConsoleCommand::Unknown("/say".into())));
        assert_eq!(parse("/bogus", "Space"), Some(ConsoleCommand::Unknown("/bogus".into())));
    }

    #[test]
    fn status_line_shows_clock_progress_and_question() {
        let snapshot = SessionSnapshot {
            elapsed_seconds: 125,
            question_index: 3,
            question: Some(Question {
                text: "Why Rust?".into(),
                ordinal: 3,
            }),
            ..SessionSnapshot::default()
        };
        let status = render_status(&snapshot);
        assert!(status.starts_with("[02:05]"));
        assert!(status.contains("progress 30%"));
        assert!(status.contains("Hold spacebar to speak or click mic"));
        assert!(status.ends_with("Q3: Why Rust?"));
    }

    #[test]
    fn ticks_are_not_printed() {
        assert_eq!(render_event(&SessionEvent::Tick { elapsed_seconds: 4 }), None);
    }
}

//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use intervox_core::api::http::DEFAULT_BASE_URL;
use intervox_core::{RecognitionSettings, SessionConfig, VoiceSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub api_base_url: String,
    pub user_id: String,
    pub job_role: String,
    pub company: String,
    pub push_to_talk_key: String,
    pub push_to_talk_debounce_ms: u64,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,
    pub recognition_language: String,
    /// Answer to the (simulated) microphone permission prompt.
    pub microphone_allowed: bool,
    /// Playback pace of the console synthesizer.
    pub speech_ms_per_word: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.into(),
            user_id: "guest".into(),
            job_role: String::new(),
            company: String::new(),
            push_to_talk_key: "Space".into(),
            push_to_talk_debounce_ms: 100,
            speech_rate: 0.9,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            recognition_language: "en-US".into(),
            microphone_allowed: true,
            speech_ms_per_word: 250,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.api_base_url = non_empty(&self.api_base_url, DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        self.user_id = non_empty(&self.user_id, "guest");
        self.job_role = self.job_role.trim().to_string();
        self.company = self.company.trim().to_string();
        self.push_to_talk_key = non_empty(&self.push_to_talk_key, "Space");
        self.push_to_talk_debounce_ms = self.push_to_talk_debounce_ms.clamp(0, 2_000);
        self.speech_rate = self.speech_rate.clamp(0.1, 10.0);
        self.speech_pitch = self.speech_pitch.clamp(0.0, 2.0);
        self.speech_volume = self.speech_volume.clamp(0.0, 1.0);
        self.recognition_language = non_empty(&self.recognition_language, "en-US");
        self.speech_ms_per_word = self.speech_ms_per_word.clamp(0, 5_000);
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            user_id: self.user_id.clone(),
            job_role: self.job_role.clone(),
            company: self.company.clone(),
            push_to_talk_key: self.push_to_talk_key.clone(),
            push_to_talk_debounce: Duration::from_millis(self.push_to_talk_debounce_ms),
            voice: VoiceSettings {
                rate: self.speech_rate,
                pitch: self.speech_pitch,
                volume: self.speech_volume,
            },
            recognition: RecognitionSettings {
                language: self.recognition_language.clone(),
                ..RecognitionSettings::default()
            },
            ..SessionConfig::default()
        }
    }
}

fn non_empty(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.into()
    } else {
        trimmed.into()
    }
}

/// Let `INTERVOX_*` variables override file values. Unparseable values are
/// ignored. Call [`AppSettings::normalize`] afterwards.
pub fn apply_env_overrides<F>(settings: &mut AppSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("INTERVOX_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("INTERVOX_USER_ID") {
        settings.user_id = v;
    }
    if let Some(v) = lookup("INTERVOX_JOB_ROLE") {
        settings.job_role = v;
    }
    if let Some(v) = lookup("INTERVOX_COMPANY") {
        settings.company = v;
    }
    if let Some(v) = lookup("INTERVOX_PTT_DEBOUNCE_MS").and_then(|v| v.trim().parse().ok()) {
        settings.push_to_talk_debounce_ms = v;
    }
    if let Some(v) = lookup("INTERVOX_MIC_ALLOWED") {
        match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => settings.microphone_allowed = true,
            "0" | "false" | "no" => settings.microphone_allowed = false,
            _ => {}
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Intervox")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("intervox")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("intervox-settings-{}-{name}", std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: AppSettings =
            serde_json::from_str(r#"{ "jobRole": "Backend Engineer", "speechRate": 1.5 }"#)
                .expect("parse partial settings");
        assert_eq!(parsed.job_role, "Backend Engineer");
        assert_eq!(parsed.speech_rate, 1.5);
        assert_eq!(parsed.push_to_talk_key, "Space");
        assert_eq!(parsed.push_to_talk_debounce_ms, 100);
    }

    #[test]
    fn normalize_clamps_and_fills_blanks() {
        let mut s = AppSettings {
            api_base_url: "  http://svc/api/  ".into(),
            user_id: "   ".into(),
            push_to_talk_key: "".into(),
            push_to_talk_debounce_ms: 60_000,
            speech_volume: 3.0,
            speech_rate: 0.0,
            recognition_language: " ".into(),
            ..AppSettings::default()
        };
        s.normalize();
        assert_eq!(s.api_base_url, "http://svc/api");
        assert_eq!(s.user_id, "guest");
        assert_eq!(s.push_to_talk_key, "Space");
        assert_eq!(s.push_to_talk_debounce_ms, 2_000);
        assert_eq!(s.speech_volume, 1.0);
        assert_eq!(s.speech_rate, 0.1);
        assert_eq!(s.recognition_language, "en-US");
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("INTERVOX_USER_ID", "candidate-7"),
            ("INTERVOX_COMPANY", "Acme"),
            ("INTERVOX_PTT_DEBOUNCE_MS", "not-a-number"),
            ("INTERVOX_MIC_ALLOWED", "no"),
        ]);
        let mut s = AppSettings::default();
        apply_env_overrides(&mut s, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.user_id, "candidate-7");
        assert_eq!(s.company, "Acme");
        assert_eq!(s.push_to_talk_debounce_ms, 100);
        assert!(!s.microphone_allowed);
    }

    #[test]
    fn session_config_carries_voice_and_debounce() {
        let s = AppSettings {
            push_to_talk_debounce_ms: 250,
            speech_pitch: 1.2,
            recognition_language: "en-GB".into(),
            ..AppSettings::default()
        };
        let config = s.session_config();
        assert_eq!(config.push_to_talk_debounce, Duration::from_millis(250));
        assert_eq!(config.voice.pitch, 1.2);
        assert_eq!(config.voice.rate, 0.9);
        assert_eq!(config.recognition.language, "en-GB");
        assert!(config.recognition.continuous);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch_path("roundtrip");
        let settings = AppSettings {
            job_role: "Data Engineer".into(),
            microphone_allowed: false,
            ..AppSettings::default()
        };
        save_settings(&path, &settings).expect("save settings");
        assert_eq!(load_settings(&path), settings);
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn missing_or_corrupt_file_falls_back_to_defaults() {
        let path = scratch_path("corrupt");
        assert_eq!(load_settings(&path), AppSettings::default());

        fs::create_dir_all(path.parent().expect("has parent")).expect("mkdir");
        fs::write(&path, "{ not json").expect("write corrupt file");
        assert_eq!(load_settings(&path), AppSettings::default());
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}

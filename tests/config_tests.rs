use anyhow::Result;
use saras_voice::stt::{BackendKind, LanguageHint};
use saras_voice::Config;
use std::time::Duration;
use tempfile::TempDir;

fn shipped_config() -> String {
    format!("{}/config/saras-voice", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn test_shipped_config_loads() -> Result<()> {
    let cfg = Config::load(&shipped_config())?;

    assert_eq!(cfg.service.http.port, 8470);
    assert_eq!(cfg.session.max_turns, 3);
    assert_eq!(cfg.session.language_hint, LanguageHint::Auto);
    assert_eq!(cfg.wake.language, LanguageHint::Locale("en".to_string()));
    assert!(!cfg.handshake.enabled);
    assert_eq!(cfg.handshake.gpio_pin, 17);

    assert_eq!(cfg.stt.backends.len(), 3);
    let whisper = &cfg.stt.backends[2];
    assert_eq!(whisper.kind, BackendKind::Offline);
    assert_eq!(whisper.subject, "stt.whisper.recognize");
    assert_eq!(cfg.stt.selector_config().preferred.as_deref(), Some("deepgram"));

    assert_eq!(cfg.responder.subject.as_deref(), Some("llm.generate"));
    assert_eq!(cfg.responder.timeout(), Duration::from_secs(15));
    Ok(())
}

#[test]
fn test_missing_file_uses_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = Config::load(dir.path().join("absent").to_str().unwrap())?;

    assert_eq!(cfg.audio.sample_rate, 16000);
    assert_eq!(cfg.session.max_listen_attempts, 3);
    assert_eq!(cfg.wake.phrases.len(), 3);
    assert!(cfg.stt.backends.is_empty());
    assert!(!cfg.nats.enabled);
    assert!(cfg.speech.subject.is_none());
    Ok(())
}

#[test]
fn test_partial_file_keeps_other_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("partial.toml");
    std::fs::write(
        &path,
        r#"
[session]
max_turns = 7
language_hint = "ml"
ask_to_continue = true

[handshake]
enabled = true
gpio_pin = 27

[audio]
source = "file:clips/hello.wav"
"#,
    )?;

    let cfg = Config::load(path.to_str().unwrap())?;

    assert_eq!(cfg.session.max_turns, 7);
    assert_eq!(cfg.session.language_hint, LanguageHint::Locale("ml".to_string()));
    assert!(cfg.session.ask_to_continue);
    assert_eq!(cfg.session.inactivity_timeout(), Duration::from_secs(60));
    assert!(cfg.session.end_phrases.iter().any(|p| p == "bye"));

    assert!(cfg.handshake.enabled);
    assert_eq!(cfg.handshake.gpio_pin, 27);
    assert!(cfg.handshake.active_low);
    assert_eq!(cfg.handshake.probe_config().debounce, Duration::from_secs(2));

    assert_eq!(cfg.audio.source, "file:clips/hello.wav");
    assert_eq!(cfg.audio.arbiter_config().pause, Duration::from_millis(600));
    Ok(())
}

#[test]
fn test_invalid_value_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[session]\nmax_turns = \"many\"\n")?;

    assert!(Config::load(path.to_str().unwrap()).is_err());
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    std::env::set_var("SARAS__SERVICE__DEVICE_ID", "kiosk-7");
    let cfg = Config::load(&shipped_config());
    std::env::remove_var("SARAS__SERVICE__DEVICE_ID");

    assert_eq!(cfg?.service.device_id, "kiosk-7");
    Ok(())
}

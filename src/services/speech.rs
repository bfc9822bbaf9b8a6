use anyhow::Result;
use tracing::info;

/// Speaks text aloud
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Resolves once playback has finished
    async fn speak(&self, text: &str, language: &str) -> Result<()>;

    fn name(&self) -> &str;
}

/// Writes replies to stdout instead of a speaker
#[derive(Debug, Default, Clone)]
pub struct ConsoleSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str, language: &str) -> Result<()> {
        info!(language, "Speaking {} characters", text.chars().count());
        println!("🔊 [{}] {}", language, text);
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

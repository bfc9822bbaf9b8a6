use anyhow::Result;

use crate::session::ConversationTurn;
use crate::stt::detect_script_language;

/// Produces the assistant's reply to a recognized utterance
#[async_trait::async_trait]
pub trait TextResponder: Send + Sync {
    /// `history` holds the most recent turns of this session, oldest first
    async fn generate(&self, text: &str, history: &[ConversationTurn]) -> Result<String>;

    fn name(&self) -> &str;
}

/// Repeats the user back, used when no language model is configured
#[derive(Debug, Default, Clone)]
pub struct EchoResponder;

#[async_trait::async_trait]
impl TextResponder for EchoResponder {
    async fn generate(&self, text: &str, _history: &[ConversationTurn]) -> Result<String> {
        Ok(match detect_script_language(text) {
            Some("ml") => format!("നിങ്ങൾ പറഞ്ഞത്: {}", text),
            _ => format!("You said: {}", text),
        })
    }

    fn name(&self) -> &str {
        "echo"
    }
}

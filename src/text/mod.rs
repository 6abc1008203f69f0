//! Text post-processing for OCR output.
//!
//! The joined page text is wrapped line by line into display markup and
//! then passed through a spell checker. Also hosts the rich-text to plain
//! text conversion used by the editor endpoints.

mod plaintext;
mod spell;
mod wrap;

use std::sync::Arc;
use std::time::Duration;

pub use plaintext::richtext_to_plaintext;
pub use spell::{HttpSpellChecker, RuleBasedCorrector, SpellCheckError, SpellChecker, SpellRule};
pub use wrap::{unwrap_lines, wrap_lines, LINE_BREAK, LINE_CLOSE, LINE_OPEN};

use crate::config::SpellcheckSettings;

/// Separator appended after every page's text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Wrap, then spell-correct.
#[derive(Clone)]
pub struct TextPostProcessor {
    checker: Arc<dyn SpellChecker>,
}

impl TextPostProcessor {
    pub fn new(checker: Arc<dyn SpellChecker>) -> Self {
        Self { checker }
    }

    /// Post-processor with only the built-in correction rules.
    pub fn with_default_rules() -> Self {
        Self::new(Arc::new(RuleBasedCorrector::new()))
    }

    pub fn checker(&self) -> &Arc<dyn SpellChecker> {
        &self.checker
    }

    pub async fn process(&self, raw: &str) -> Result<String, SpellCheckError> {
        let wrapped = wrap_lines(raw);
        self.checker.correct(&wrapped).await
    }
}

/// Build the checker selected in settings.
pub fn build_spell_checker(
    settings: &SpellcheckSettings,
) -> Result<Arc<dyn SpellChecker>, SpellCheckError> {
    match settings.endpoint {
        Some(ref endpoint) => Ok(Arc::new(HttpSpellChecker::new(
            endpoint.clone(),
            Duration::from_secs(30),
        )?)),
        None => Ok(Arc::new(RuleBasedCorrector::with_rules(&settings.rules)?)),
    }
}

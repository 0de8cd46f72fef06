//! Language identification for extracted article text.

/// Best-guess language of a piece of text.
pub trait LanguageIdentifier: Send + Sync {
    /// Returns a language code, or `None` when the text gives no signal.
    fn identify(&self, text: &str) -> Option<String>;
}

/// Trigram-based identifier backed by `whatlang`.
///
/// Reports ISO 639-1 codes where one exists (`"en"`, `"tr"`), otherwise
/// whatlang's ISO 639-3 code.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangIdentifier;

impl LanguageIdentifier for WhatlangIdentifier {
    fn identify(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        let code = info.lang().code();
        Some(iso_639_1(code).unwrap_or(code).to_string())
    }
}

/// Map an ISO 639-3 code to its two-letter ISO 639-1 form.
///
/// whatlang reports some languages by their individual code, which has no
/// 639-1 form of its own; those go to the macrolanguage's code.
fn iso_639_1(code: &str) -> Option<&'static str> {
    match code {
        "cmn" => Some("zh"),
        "pes" => Some("fa"),
        _ => isolang::Language::from_639_3(code)?.to_639_1(),
    }
}

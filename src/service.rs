//! Conversion orchestration.
//!
//! VALIDATE → TRANSLATE (optional) → SYNTHESIZE → RECORD

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use base64::Engine as _;
use chrono::Local;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::history::{ConversionLedger, ConversionRecord};
use crate::languages;
use crate::speech::translator::{GoogleTranslator, Translator};
use crate::speech::tts::{GoogleTts, SpeechSynthesizer};

/// One user request to turn text into speech.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub text: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Overrides `translate.enabled` for this request.
    #[serde(default)]
    pub translate: Option<bool>,
}

fn default_speed() -> f32 {
    1.0
}

impl ConversionRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: Some(language.into()),
            speed: default_speed(),
            translate: None,
        }
    }

    /// The speech endpoint only offers normal and slow speech.
    pub fn slow(&self) -> bool {
        self.speed < 1.0
    }
}

/// Result of a successful conversion.
#[derive(Debug)]
pub struct Conversion {
    pub audio: Vec<u8>,
    pub text_spoken: String,
    pub language: String,
    pub translated: bool,
    pub filename: String,
    pub word_count: usize,
    /// Non-fatal problems to show the user (translation or history failures).
    pub warnings: Vec<String>,
}

impl Conversion {
    pub fn audio_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.audio)
    }

    /// `data:` URI suitable for a download link.
    pub fn download_href(&self) -> String {
        format!("data:audio/mp3;base64,{}", self.audio_base64())
    }
}

pub struct ConversionService {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    translator: Option<Arc<dyn Translator>>,
    ledger: Mutex<ConversionLedger>,
    default_language: String,
    source_language: String,
    max_chars: usize,
}

impl ConversionService {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        translator: Option<Arc<dyn Translator>>,
        ledger: ConversionLedger,
        config: &Config,
    ) -> Self {
        Self {
            synthesizer,
            translator,
            ledger: Mutex::new(ledger),
            default_language: config.tts.default_language.clone(),
            source_language: config.translate.source_language.clone(),
            max_chars: config.tts.max_chars,
        }
    }

    /// Wire up the Google clients and the configured history backend.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(GoogleTts::new(&config.tts)?);
        let translator: Option<Arc<dyn Translator>> = if config.translate.enabled {
            Some(Arc::new(GoogleTranslator::new(
                &config.translate,
                config.tts.timeout_secs,
            )?))
        } else {
            None
        };

        let ledger = config.history.open_ledger();
        info!("Conversion history: {}", ledger.backend());

        Ok(Self::new(synthesizer, translator, ledger, config))
    }

    pub fn translation_enabled(&self) -> bool {
        self.translator.is_some()
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    fn ledger(&self) -> MutexGuard<'_, ConversionLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Most recent conversions, newest first.
    pub fn recent(&self, n: usize) -> Vec<ConversionRecord> {
        self.ledger().recent(n)
    }

    pub fn history_len(&self) -> usize {
        self.ledger().len()
    }

    pub fn history_backend(&self) -> String {
        self.ledger().backend()
    }

    fn validate(
        &self,
        request: &ConversionRequest,
    ) -> Result<&'static languages::Language, AppError> {
        if request.text.trim().is_empty() {
            return Err(AppError::Validation(
                "Please enter some text to convert to speech.".into(),
            ));
        }

        let chars = request.text.chars().count();
        if chars > self.max_chars {
            return Err(AppError::Validation(format!(
                "Text is too long ({chars} characters, maximum {}).",
                self.max_chars
            )));
        }

        let code = request.language.as_deref().unwrap_or(&self.default_language);
        languages::find(code).ok_or_else(|| AppError::UnsupportedLanguage(code.to_string()))
    }

    /// Translate into `target` when enabled. `None` means no translation applies.
    async fn maybe_translate(
        &self,
        request: &ConversionRequest,
        target: &str,
    ) -> Result<Option<String>, AppError> {
        let Some(translator) = &self.translator else {
            return Ok(None);
        };
        let opted_out = !request.translate.unwrap_or(true);
        if opted_out || target.eq_ignore_ascii_case(&self.source_language) {
            return Ok(None);
        }

        translator.translate(&request.text, target).await.map(Some)
    }

    pub async fn convert(&self, request: ConversionRequest) -> Result<Conversion, AppError> {
        let t0 = Instant::now();
        let language = self.validate(&request)?;

        let mut warnings = Vec::new();

        let translation = self.maybe_translate(&request, language.code).await;
        let (text_spoken, translated) = match translation {
            Ok(Some(text)) => (text, true),
            Ok(None) => (request.text.clone(), false),
            Err(e) => {
                warn!("{e}, speaking original text");
                warnings.push(format!("{e}. The original text was spoken."));
                (request.text.clone(), false)
            }
        };

        let audio = self
            .synthesizer
            .synthesize(&text_spoken, languages::tts_code(language.code), request.slow())
            .await?;

        let record = ConversionRecord::now(&text_spoken, language.code);
        if let Err(e) = self.ledger().append(record) {
            warn!("Conversion not recorded: {e}");
            warnings.push(format!("Could not save conversion history: {e}"));
        }

        info!(
            "Converted {} chars [{}{}] in {:.0}ms",
            request.text.chars().count(),
            language.code,
            if translated { ", translated" } else { "" },
            t0.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Conversion {
            audio,
            text_spoken,
            language: language.code.to_string(),
            translated,
            filename: format!("tts_output_{}.mp3", Local::now().format("%Y%m%d_%H%M%S")),
            word_count: request.text.split_whitespace().count(),
            warnings,
        })
    }
}

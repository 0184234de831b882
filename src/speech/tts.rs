//! Google Translate text-to-speech client.
//!
//! Pipeline:
//! 1. Text → chunks of at most 100 characters (sentences, then words)
//! 2. Chunk → `jQ1olc` RPC on the `batchexecute` endpoint
//! 3. Response → base64 MP3 payload → bytes
//! 4. Chunk MP3 frames are concatenated into one stream

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::TtsConfig;
use crate::error::AppError;

/// Longest text the speech RPC accepts in one call.
pub const MAX_CHUNK_CHARS: usize = 100;

const RPC_ID: &str = "jQ1olc";
const RPC_PATH: &str = "/_/TranslateWebserverUi/data/batchexecute";
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/120.0 Safari/537.36"
);

/// Sentence stops that are written without a following space.
const FULL_WIDTH_STOPS: [char; 4] = ['。', '！', '？', '；'];

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language` to MP3 bytes.
    async fn synthesize(&self, text: &str, language: &str, slow: bool) -> Result<Vec<u8>, AppError>;
}

pub struct GoogleTts {
    host: String,
    client: Client,
    payload_re: Regex,
}

impl GoogleTts {
    pub fn new(config: &TtsConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Synthesis(format!("failed to create HTTP client: {e}")))?;
        let payload_re = Regex::new(r#"jQ1olc","\[\\"(.*)\\"]"#)
            .map_err(|e| AppError::Synthesis(format!("invalid payload pattern: {e}")))?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            client,
            payload_re,
        })
    }

    async fn synthesize_chunk(
        &self,
        chunk: &str,
        language: &str,
        slow: bool,
    ) -> Result<Vec<u8>, AppError> {
        let url = format!("{}{RPC_PATH}", self.host);
        let form = [("f.req", rpc_payload(chunk, language, slow))];

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::REFERER, format!("{}/", self.host))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AppError::Synthesis(format!("cannot connect to {}", self.host))
                } else if e.is_timeout() {
                    AppError::Synthesis("speech request timed out".into())
                } else {
                    AppError::Synthesis(format!("speech request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Synthesis(format!("speech endpoint returned status {status}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Synthesis(format!("failed to read speech response: {e}")))?;

        self.decode_audio(&body)
    }

    /// Pull the MP3 bytes out of a `batchexecute` response body.
    fn decode_audio(&self, body: &str) -> Result<Vec<u8>, AppError> {
        let mut audio = Vec::new();
        for line in body.lines().filter(|l| l.contains(RPC_ID)) {
            let Some(encoded) = self.payload_re.captures(line).and_then(|c| c.get(1)) else {
                continue;
            };
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.as_str())
                .map_err(|e| AppError::Synthesis(format!("invalid audio payload: {e}")))?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(AppError::Synthesis(
                "no audio received; the language may not be supported".into(),
            ));
        }
        Ok(audio)
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        slow: bool,
    ) -> Result<Vec<u8>, AppError> {
        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(AppError::Validation("No speakable text found.".into()));
        }

        let t0 = Instant::now();
        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(
                "Synthesizing chunk {}/{} ({} chars)",
                i + 1,
                chunks.len(),
                chunk.chars().count()
            );
            audio.extend(self.synthesize_chunk(chunk, language, slow).await?);
        }

        info!(
            "Synthesized {} chunks [{language}, slow={slow}] → {} bytes in {:.0}ms",
            chunks.len(),
            audio.len(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(audio)
    }
}

/// `f.req` form value for one speech RPC call.
fn rpc_payload(text: &str, language: &str, slow: bool) -> String {
    let speed = if slow { Value::Bool(true) } else { Value::Null };
    let inner = json!([text, language, speed, "null"]).to_string();
    json!([[[RPC_ID, inner, Value::Null, "generic"]]]).to_string()
}

fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Split after sentence punctuation. `.` and `:` only end a sentence before
/// whitespace or at the end, so numbers like `3.14` stay whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        let boundary = match c {
            '\n' | '!' | '?' | ';' | '。' | '！' | '？' | '；' => true,
            '.' | ':' => iter.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if boundary {
            let end = i + c.len_utf8();
            out.push(&text[start..end]);
            start = end;
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

fn fits(current: &str, next: &str, max_chars: usize) -> bool {
    let current_len = current.chars().count();
    let next_len = next.chars().count();
    if current_len == 0 {
        next_len <= max_chars
    } else {
        current_len + 1 + next_len <= max_chars
    }
}

fn push_word(current: &mut String, next: &str) {
    if !current.is_empty() && !current.ends_with(FULL_WIDTH_STOPS) {
        current.push(' ');
    }
    current.push_str(next);
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    if is_speakable(current) {
        chunks.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Break text into speakable chunks of at most `max_chars` characters.
///
/// Whole sentences are merged while they fit. Longer sentences are split on
/// whitespace, and words longer than the limit are cut on character boundaries.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
        if sentence.is_empty() {
            continue;
        }
        if fits(&current, &sentence, max_chars) {
            push_word(&mut current, &sentence);
            continue;
        }

        flush(&mut current, &mut chunks);
        if sentence.chars().count() <= max_chars {
            current = sentence;
            continue;
        }

        for word in sentence.split_whitespace() {
            if !fits(&current, word, max_chars) {
                flush(&mut current, &mut chunks);
            }
            if word.chars().count() <= max_chars {
                push_word(&mut current, word);
                continue;
            }

            let chars: Vec<char> = word.chars().collect();
            let mut pieces: Vec<String> =
                chars.chunks(max_chars).map(|p| p.iter().collect()).collect();
            if let Some(last) = pieces.pop() {
                for mut piece in pieces {
                    flush(&mut piece, &mut chunks);
                }
                current = last;
            }
        }
    }
    flush(&mut current, &mut chunks);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(host: &str) -> GoogleTts {
        GoogleTts::new(&TtsConfig {
            host: host.to_string(),
            ..TtsConfig::default()
        })
        .unwrap()
    }

    const ID3_RESPONSE: &str = concat!(
        ")]}'\n\n104\n",
        "[[\"wrb.fr\",\"jQ1olc\",\"[\\\"SUQz\\\"]\",null,null,null,\"generic\"]]\n",
        "25\n[[\"e\",4,null,null,140]]\n"
    );

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_into_chunks("Hello world.", 100), vec!["Hello world."]);
    }

    #[test]
    fn chunks_respect_limit() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let chunks = split_into_chunks(&text, MAX_CHUNK_CHARS);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined.split_whitespace().count(), text.split_whitespace().count());
    }

    #[test]
    fn breaks_at_sentence_ends_when_possible() {
        let text = format!("{}. {}.", "a ".repeat(40).trim(), "b ".repeat(40).trim());
        let chunks = split_into_chunks(&text, MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with("a."));
        assert!(chunks[1].starts_with("b "));
    }

    #[test]
    fn full_width_sentences_join_without_space() {
        assert_eq!(split_into_chunks("你好。再见。", 100), vec!["你好。再见。"]);
        assert_eq!(split_into_chunks("Hi. Bye.", 100), vec!["Hi. Bye."]);
    }

    #[test]
    fn overlong_word_is_cut() {
        let word = "a".repeat(250);
        let chunks = split_into_chunks(&word, 100);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![100, 100, 50]);
    }

    #[test]
    fn punctuation_only_text_has_no_chunks() {
        assert!(split_into_chunks(" ... !! ?", 100).is_empty());
    }

    #[test]
    fn decimals_are_not_sentence_breaks() {
        assert_eq!(split_sentences("Pi is 3.14. Done"), vec!["Pi is 3.14.", " Done"]);
    }

    #[test]
    fn payload_matches_rpc_shape() {
        let payload = rpc_payload("hi", "en", true);
        assert_eq!(
            payload,
            r#"[[["jQ1olc","[\"hi\",\"en\",true,\"null\"]",null,"generic"]]]"#
        );
        assert!(rpc_payload("hi", "en", false).contains(r#"\"en\",null,"#));
    }

    #[test]
    fn decodes_audio_payload() {
        let audio = engine("http://unused").decode_audio(ID3_RESPONSE).unwrap();
        assert_eq!(audio, b"ID3");
    }

    #[test]
    fn missing_payload_is_an_error() {
        let err = engine("http://unused")
            .decode_audio(")]}'\n[[\"e\",4]]")
            .unwrap_err();
        assert!(matches!(err, AppError::Synthesis(_)));
    }

    #[tokio::test]
    async fn synthesizes_each_chunk() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", RPC_PATH)
            .with_status(200)
            .with_body(ID3_RESPONSE)
            .expect(2)
            .create_async()
            .await;

        let text = format!("{} {}", "word ".repeat(15).trim(), "more ".repeat(15).trim());
        let audio = engine(&server.url()).synthesize(&text, "en", false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(audio, b"ID3ID3");
    }

    #[tokio::test]
    async fn upstream_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("POST", RPC_PATH).with_status(429).create_async().await;

        let err = engine(&server.url()).synthesize("hello", "en", false).await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}

// Request/response contract shared by the generator and the translation agents
//
// Everything that crosses the capability boundary as text is rendered and
// parsed here. Responses are never trusted: they are fence-stripped, parsed
// and shape-checked before anything downstream sees them.

use super::capability::GenerationRequest;
use super::types::{TranslationRequest, TranslationResult};
use serde::Deserialize;

/// Human-readable name for a language code, for prompts and console output
pub fn language_name(code: &str) -> &str {
    match code {
        "he" => "Hebrew",
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "zh" => "Chinese",
        "ja" => "Japanese",
        _ => code,
    }
}

/// Remove a Markdown code fence wrapped around a payload.
///
/// When the trimmed text opens with a fence line, the payload is everything
/// between that line and the next fence line (or the end of the text).
/// Otherwise the trimmed text is returned unchanged.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text;
    }

    // Skip the opening fence line, including any language tag
    let body = match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => return "",
    };

    let mut end = body.len();
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            end = offset;
            break;
        }
        offset += line.len();
    }

    body[..end].trim()
}

/// Built-in behavioural profile for a language pair
pub fn default_profile(source_language: &str, target_language: &str) -> String {
    let source = language_name(source_language);
    let target = language_name(target_language);
    format!(
        r#"You are a professional {source}-to-{target} translator working inside an automated pipeline.

For every request you receive a JSON object with the fields "sentence_id", "text",
"source_language" ("{source_language}"), "target_language" ("{target_language}") and "timestamp".

Translate "text" from {source} into natural, fluent {target}. Preserve the meaning,
tone and register of the original. Do not add explanations or commentary.
If "text" is empty, return an empty translation with confidence 0.5.

Respond with ONLY a JSON object in this exact format:
{{
  "sentence_id": <same id as the request>,
  "translation": "<the {target} translation>",
  "confidence": <number between 0.0 and 1.0>,
  "agent_id": "<your agent id>",
  "notes": "<optional short remark, or empty string>"
}}"#
    )
}

/// User message carrying one translation request
pub fn render_translation_prompt(request: &TranslationRequest) -> String {
    let payload = serde_json::to_string_pretty(request).unwrap_or_else(|_| request.text.clone());
    format!(
        "Please translate the following sentence:\n\n{}\n\n\
         Respond with ONLY a valid JSON object in the format specified in your system prompt. \
         Do not include any other text or explanation.",
        payload
    )
}

/// System instruction for the sentence generator
pub fn generation_profile() -> &'static str {
    "You generate test sentences for a translation quality experiment. \
     You always answer with a bare JSON array of strings and nothing else."
}

/// User message asking for `request.count` sentences
pub fn render_generation_prompt(request: &GenerationRequest) -> String {
    let language = language_name(&request.language);
    let focus = match &request.topic {
        Some(topic) if !topic.trim().is_empty() => format!("- Focus on topic: {}", topic.trim()),
        _ => "- Cover diverse topics (technology, nature, daily life, science, culture)".to_string(),
    };

    format!(
        "Generate exactly {count} meaningful {language} sentences.\n\n\
         Requirements:\n\
         - Each sentence must be maximum {words} words\n\
         - Sentences must be grammatically correct and contextually meaningful\n\
         - Vary the sentence structures and topics\n\
         - Use modern, everyday {language}\n\
         {focus}\n\n\
         Respond with ONLY a JSON array of sentences, like this:\n\
         [\"first sentence\", \"second sentence\", \"third sentence\", ...]\n\n\
         Do not include any other text or explanation.",
        count = request.count,
        language = language,
        words = request.max_words_per_sentence,
        focus = focus,
    )
}

#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(default, alias = "sequence_id")]
    sentence_id: Option<u32>,
    translation: Option<String>,
    confidence: Option<f64>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// Parse a translation payload into a result for `request`.
///
/// The request's sequence id always wins over whatever the payload claims.
/// Zero confidence with notes is the translator reporting failure; any text
/// it sent alongside is dropped.
pub fn parse_translation_payload(
    raw: &str,
    request: &TranslationRequest,
    agent_id: &str,
) -> Result<TranslationResult, ProtocolError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let payload: WirePayload =
        serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let translation = payload.translation.ok_or(ProtocolError::MissingField("translation"))?;
    let confidence = payload.confidence.ok_or(ProtocolError::MissingField("confidence"))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ProtocolError::Confidence(confidence));
    }

    let notes = payload.notes.unwrap_or_default();
    if confidence == 0.0 && !notes.trim().is_empty() {
        return Err(ProtocolError::Reported(notes.trim().to_string()));
    }

    if let Some(id) = payload.sentence_id {
        if id != request.sequence_id {
            tracing::warn!(
                agent = agent_id,
                expected = request.sequence_id,
                got = id,
                "translation payload carries a different sentence id"
            );
        }
    }

    Ok(TranslationResult {
        sequence_id: request.sequence_id,
        translation: translation.trim().to_string(),
        confidence,
        agent_id: payload
            .agent_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| agent_id.to_string()),
        notes,
    })
}

/// Parse a payload, folding every failure into the canonical failure result
pub fn translation_outcome(raw: &str, request: &TranslationRequest, agent_id: &str) -> TranslationResult {
    parse_translation_payload(raw, request, agent_id)
        .unwrap_or_else(|e| TranslationResult::failure(request.sequence_id, agent_id, e))
}

/// Validate a generation response as a JSON list of strings
pub fn parse_sentence_list(raw: &str) -> Result<Vec<String>, GenerationError> {
    let body = strip_code_fence(raw);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| GenerationError::NotJson(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        other => return Err(GenerationError::NotAList(json_kind(&other))),
    };

    let sentences = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::String(text) => Ok(text.trim().to_string()),
            other => Err(GenerationError::NonStringItem {
                index,
                kind: json_kind(&other),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sentences.is_empty() {
        return Err(GenerationError::Empty);
    }

    Ok(sentences)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty response")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload is missing '{0}'")]
    MissingField(&'static str),

    #[error("confidence {0} is outside [0, 1]")]
    Confidence(f64),

    #[error("translator reported failure: {0}")]
    Reported(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response is not a list (got {0})")]
    NotAList(&'static str),

    #[error("item {index} is a {kind}, not a string")]
    NonStringItem { index: usize, kind: &'static str },

    #[error("response list is empty")]
    Empty,
}

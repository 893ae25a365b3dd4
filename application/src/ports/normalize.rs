//! Normalization utilities every [`super::model_adapter::ModelAdapter`] is
//! expected to honor: system-prompt concatenation, media-source conversion,
//! stop-reason mapping, and usage-synonym normalization. Kept as free
//! functions rather than trait methods since they operate on plain data and
//! have one obviously correct behavior, not something an adapter customizes.

use relaykit_domain::{MediaSource, Message, Role, StopReason, Usage};

/// Concatenate every `system`-role message's text with `\n\n`, the shape most
/// chat-completion APIs expect for a single system prompt. Returns `None` if
/// there are no system messages.
pub fn concat_system_prompt(messages: &[Message]) -> Option<String> {
    let parts: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.text_content())
        .filter(|t| !t.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Render a media source as a `data:` URL, the form providers that only
/// accept inline base64 with a `data:` wrapper require.
pub fn source_to_data_url(source: &MediaSource) -> Option<String> {
    match source {
        MediaSource::Base64 { media_type, data } => Some(format!("data:{media_type};base64,{data}")),
        MediaSource::Url { url, .. } if url.starts_with("data:") => Some(url.clone()),
        _ => None,
    }
}

/// Pull `(media_type, base64_data)` out of a media source without a network
/// call: `base64` sources pass through directly, `data:` URLs are split
/// in-place. Remote `url`/`s3`/`gcs`/`file_id` sources have no inline bytes to
/// extract and return `None` — fetching those is the adapter's job, not this
/// function's.
pub fn source_to_base64(source: &MediaSource) -> Option<(String, String)> {
    match source {
        MediaSource::Base64 { media_type, data } => Some((media_type.clone(), data.clone())),
        MediaSource::Url { url, media_type } => {
            let rest = url.strip_prefix("data:")?;
            let (header, payload) = rest.split_once(',')?;
            let mt = header.split(';').next().filter(|s| !s.is_empty()).map(str::to_string);
            Some((mt.or_else(|| media_type.clone()).unwrap_or_default(), payload.to_string()))
        }
        _ => None,
    }
}

/// Map a provider's own stop-reason string onto the canonical [`StopReason`].
/// Unrecognized values degrade to `Other` rather than failing the call.
pub fn map_stop_reason(raw: &str) -> StopReason {
    match raw {
        "stop" | "end_turn" | "stop_sequence" | "completed" => StopReason::Stop,
        "length" | "max_tokens" => StopReason::MaxTokens,
        "tool_calls" | "tool_use" | "function_call" => StopReason::ToolUse,
        "content_filter" | "content_filtered" => StopReason::ContentFilter,
        "error" | "failed" => StopReason::Error,
        "" => StopReason::Unspecified,
        _ => StopReason::Other,
    }
}

/// Read token counts out of a provider usage object, accepting the
/// `prompt_tokens` / `promptTokens` / `inputTokens` family of synonyms (and
/// the matching completion/output and total fields). Missing fields default
/// to zero; a missing total is derived from input + output.
pub fn normalize_usage(raw: &serde_json::Value) -> Usage {
    fn field(raw: &serde_json::Value, names: &[&str]) -> u64 {
        names.iter().find_map(|n| raw.get(n)).and_then(|v| v.as_u64()).unwrap_or(0)
    }

    let input_tokens = field(raw, &["input_tokens", "inputTokens", "prompt_tokens", "promptTokens"]);
    let output_tokens = field(raw, &["output_tokens", "outputTokens", "completion_tokens", "completionTokens"]);
    let reported_total = field(raw, &["total_tokens", "totalTokens"]);
    let total_tokens = if reported_total > 0 { reported_total } else { input_tokens + output_tokens };

    Usage { input_tokens, output_tokens, total_tokens }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_consecutive_system_messages() {
        let messages = vec![Message::system("be terse"), Message::system("no emoji"), Message::user("hi")];
        assert_eq!(concat_system_prompt(&messages).as_deref(), Some("be terse\n\nno emoji"));
    }

    #[test]
    fn no_system_messages_yields_none() {
        assert!(concat_system_prompt(&[Message::user("hi")]).is_none());
    }

    #[test]
    fn base64_source_round_trips_through_a_data_url() {
        let source = MediaSource::Base64 { media_type: "image/png".into(), data: "Zm9v".into() };
        let url = source_to_data_url(&source).unwrap();
        assert_eq!(url, "data:image/png;base64,Zm9v");

        let reparsed = MediaSource::Url { media_type: None, url };
        let (media_type, data) = source_to_base64(&reparsed).unwrap();
        assert_eq!(media_type, "image/png");
        assert_eq!(data, "Zm9v");
    }

    #[test]
    fn remote_url_source_has_no_inline_bytes() {
        let source = MediaSource::Url { media_type: Some("image/png".into()), url: "https://example.com/a.png".into() };
        assert!(source_to_base64(&source).is_none());
    }

    #[test]
    fn stop_reason_synonyms_map_to_the_canonical_variant() {
        assert_eq!(map_stop_reason("end_turn"), StopReason::Stop);
        assert_eq!(map_stop_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(map_stop_reason("max_tokens"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("something_new"), StopReason::Other);
    }

    #[test]
    fn usage_synonyms_normalize_regardless_of_provider_casing() {
        let anthropic = serde_json::json!({"input_tokens": 10, "output_tokens": 5});
        assert_eq!(normalize_usage(&anthropic), Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15 });

        let openai = serde_json::json!({"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15});
        assert_eq!(normalize_usage(&openai), Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15 });

        let camel = serde_json::json!({"promptTokens": 8, "completionTokens": 2});
        assert_eq!(normalize_usage(&camel), Usage { input_tokens: 8, output_tokens: 2, total_tokens: 10 });
    }
}

use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 4] = ["token", "secret", "authorization", "password"];

/// Scrubs bearer credentials and token-like values from free text.
pub fn redact_text(input: &str) -> String {
    let mut redact_next = false;

    input
        .split_whitespace()
        .map(|chunk| {
            if redact_next {
                redact_next = false;
                return REDACTED.to_owned();
            }
            if chunk.eq_ignore_ascii_case("bearer") {
                redact_next = true;
                return chunk.to_owned();
            }
            redact_chunk(chunk)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "clubsync panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("clubsync panic: {}", scrubbed);
        }
    }));
}

fn redact_chunk(chunk: &str) -> String {
    let lowered = chunk.to_ascii_lowercase();
    let keyed_secret = SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        && chunk.contains(['=', ':']);

    if keyed_secret || looks_like_jwt(chunk) {
        REDACTED.to_owned()
    } else {
        chunk.to_owned()
    }
}

/// Three non-empty base64url segments separated by dots.
fn looks_like_jwt(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    let segments: Vec<&str> = cleaned.split('.').collect();

    segments.len() == 3
        && segments.iter().all(|segment| {
            segment.len() >= 4
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        })
}

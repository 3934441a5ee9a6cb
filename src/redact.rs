use std::borrow::Cow;

const BEARER_MARKER: &str = "Bearer ";

/// Replaces the credential after any `Bearer ` marker with `REDACTED` so
/// transport errors and echoed backend messages never leak a token.
pub fn redact_bearer(input: &str) -> Cow<'_, str> {
    if !input.contains(BEARER_MARKER) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find(BEARER_MARKER) {
        out.push_str(&rest[..idx + BEARER_MARKER.len()]);
        rest = &rest[idx + BEARER_MARKER.len()..];

        // Consume the token tail: JWT segments plus base64url characters.
        let mut consumed = 0;
        for ch in rest.chars() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-' | '=') {
                consumed += ch.len_utf8();
            } else {
                break;
            }
        }
        if consumed > 0 {
            out.push_str("REDACTED");
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);

    if out == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_token_in_header_line() {
        let input = "Authorization: Bearer eyJh.eyJl.sig rejected\n";
        let out = redact_bearer(input);
        assert_eq!(out, "Authorization: Bearer REDACTED rejected\n");
        assert!(!out.contains("eyJh"));
    }

    #[test]
    fn redacts_every_occurrence() {
        let input = "sent Bearer abc123 then Bearer def456";
        assert_eq!(
            redact_bearer(input),
            "sent Bearer REDACTED then Bearer REDACTED"
        );
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let input = "connection refused (os error 111)";
        assert!(matches!(redact_bearer(input), Cow::Borrowed(_)));
    }
}

//! Pure input cleaners applied before anything is persisted or forwarded.

use serde::Serialize;

/// Named cleaning function attached to a setting or request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanitizer {
    /// Strip markup, line breaks, percent-encoded octets and redundant whitespace.
    TextField,
    /// Escape a value for safe use inside an HTML attribute.
    Attribute,
    /// Text field, upper-cased; used for ISO country codes.
    CountryCode,
    /// Keep only characters that may appear in an e-mail address.
    Email,
    /// Keep digits and the usual phone punctuation.
    Phone,
}

impl Sanitizer {
    pub fn apply(self, raw: &str) -> String {
        match self {
            Sanitizer::TextField => text_field(raw),
            Sanitizer::Attribute => attribute(raw.trim()),
            Sanitizer::CountryCode => text_field(raw).to_ascii_uppercase(),
            Sanitizer::Email => email(raw),
            Sanitizer::Phone => phone(raw),
        }
    }

    pub fn apply_all<S: AsRef<str>>(self, values: &[S]) -> Vec<String> {
        values.iter().map(|value| self.apply(value.as_ref())).collect()
    }
}

fn text_field(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let decoded = strip_percent_octets(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes `<tag ...>` runs; a `<` that cannot open a tag is kept as `&lt;`.
fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '<' {
            out.push(ch);
            continue;
        }

        let opens_tag = matches!(
            chars.peek(),
            Some(next) if next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?')
        );
        if !opens_tag {
            out.push_str("&lt;");
            continue;
        }

        // Unterminated tags swallow the remainder, like the platform does.
        for inner in chars.by_ref() {
            if inner == '>' {
                break;
            }
        }
    }

    out
}

fn strip_percent_octets(raw: &str) -> String {
    let mut current = raw.to_string();
    loop {
        let next = strip_percent_octets_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_percent_octets_once(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut index = 0;

    while index < raw.len() {
        if bytes[index] == b'%'
            && index + 2 < bytes.len()
            && bytes[index + 1].is_ascii_hexdigit()
            && bytes[index + 2].is_ascii_hexdigit()
        {
            index += 3;
            continue;
        }
        let ch = raw[index..].chars().next().unwrap_or_default();
        out.push(ch);
        index += ch.len_utf8().max(1);
    }

    out
}

fn attribute(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn email(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-@".contains(*ch))
        .collect()
}

fn phone(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '(' | ')' | '.' | ' '))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_field_strips_markup_and_whitespace() {
        assert_eq!(
            Sanitizer::TextField.apply("  <b>123</b>\tMain\n  St <script>x()</script> "),
            "123 Main St x()"
        );
        assert_eq!(Sanitizer::TextField.apply("a < b"), "a &lt; b");
        assert_eq!(Sanitizer::TextField.apply("Suite%20A"), "SuiteA");
        assert_eq!(Sanitizer::TextField.apply("100%"), "100%");
        assert_eq!(Sanitizer::TextField.apply("x%%4141y"), "xy");
    }

    #[test]
    fn text_field_keeps_non_ascii_text() {
        assert_eq!(Sanitizer::TextField.apply(" Zürich  "), "Zürich");
    }

    #[test]
    fn attribute_escapes_html_significant_characters() {
        assert_eq!(
            Sanitizer::Attribute.apply(" \"Bob\" <bob@example.com> & Co's "),
            "&quot;Bob&quot; &lt;bob@example.com&gt; &amp; Co&#039;s"
        );
    }

    #[test]
    fn country_code_is_upper_cased() {
        assert_eq!(Sanitizer::CountryCode.apply(" us "), "US");
    }

    #[test]
    fn email_and_phone_drop_foreign_characters() {
        assert_eq!(
            Sanitizer::Email.apply(" ship ping@example.com "),
            "shipping@example.com"
        );
        assert_eq!(Sanitizer::Phone.apply("+1 (503)  555-0100 ext"), "+1 (503) 555-0100");
    }

    #[test]
    fn setting_sanitizers_are_idempotent() {
        let samples = ["  <i>Main</i>  St ", "x%%4141y", "a < b", " us ", "+1 (503) 555"];
        for sanitizer in [
            Sanitizer::TextField,
            Sanitizer::CountryCode,
            Sanitizer::Email,
            Sanitizer::Phone,
        ] {
            for sample in samples {
                let once = sanitizer.apply(sample);
                assert_eq!(sanitizer.apply(&once), once, "{sanitizer:?} on {sample:?}");
            }
        }
    }

    #[test]
    fn apply_all_preserves_order() {
        assert_eq!(
            Sanitizer::TextField.apply_all(&[" b ", "a"]),
            vec!["b".to_string(), "a".to_string()]
        );
    }
}

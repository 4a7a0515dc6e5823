//! Cleanup applied to source text before validation.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

const FENCE: &str = "```";

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").expect("fenced block pattern")
    })
}

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[^\n]*\n").expect("opening fence pattern"))
}

/// Unwraps code that arrives inside Markdown fences, as generated code
/// usually does.
///
/// Returns the body of the first fenced block. Stray fence markers without a
/// well-formed block are removed. Text without fences is returned untouched.
pub fn strip_markdown_fences(code: &str) -> Cow<'_, str> {
    if !code.contains(FENCE) {
        return Cow::Borrowed(code);
    }

    if let Some(body) = fenced_block().captures(code).and_then(|c| c.get(1)) {
        return Cow::Owned(body.as_str().trim().to_string());
    }

    let without_openers = opening_fence().replace_all(code, "");
    Cow::Owned(without_openers.replace(FENCE, ""))
}

//! Markup stripping for chatter bodies.

use once_cell::sync::Lazy;
use regex::Regex;

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*li\b[^>]*>").expect("list item pattern"));

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:br|p|div|ul|ol|li|tr|table|blockquote|h[1-6])\b[^>]*>")
        .expect("block tag pattern")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("entity pattern"));

/// Plain text of a markup body.
///
/// Block tags become line breaks, list items become `- ` bullets, other tags
/// are dropped and entities decoded. Lines are trimmed and blank lines removed.
pub fn strip_markup(body: &str) -> String {
    let text = LIST_ITEM.replace_all(body, "\n- ");
    let text = BLOCK_TAG.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            decode_entity(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

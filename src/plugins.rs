use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap());
static ENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#?[a-zA-Z0-9]+);").unwrap());

/// Quote lines are wrapped before reaching this many characters.
const QUOTE_WIDTH: usize = 40;

#[derive(thiserror::Error, Debug)]
pub enum PluginError {
    #[error("unknown plugin command '{0}'")]
    UnknownCommand(String),
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Commands that hand the clipboard text to the user before anything is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    /// Read-only view; the clipboard stays as it is.
    Show,
    /// Find/replace form over the text.
    Replace,
}

/// Text transforms offered in the clipboard submenu.
pub trait PluginHost: Send + Sync {
    /// `(label, command id)` pairs in menu order.
    fn menu_items(&self) -> Vec<(String, String)>;
    fn invoke(&self, command: &str, input: &str) -> Result<String, PluginError>;

    fn review(&self, _command: &str) -> Option<Review> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCommand {
    ShowContents,
    Replace,
    StripNumbers,
    RemoveBlanks,
    ReplaceUmlauts,
    TabToSpace,
    Uppercase,
    RemoveEmptyLines,
    RemoveSpecials,
    HtmlToRtf,
    Quote,
}

impl PluginCommand {
    pub const ALL: [PluginCommand; 11] = [
        PluginCommand::ShowContents,
        PluginCommand::Replace,
        PluginCommand::RemoveBlanks,
        PluginCommand::ReplaceUmlauts,
        PluginCommand::TabToSpace,
        PluginCommand::Uppercase,
        PluginCommand::RemoveEmptyLines,
        PluginCommand::RemoveSpecials,
        PluginCommand::StripNumbers,
        PluginCommand::HtmlToRtf,
        PluginCommand::Quote,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PluginCommand::ShowContents => "show_contents",
            PluginCommand::Replace => "replace",
            PluginCommand::StripNumbers => "strip_numbers",
            PluginCommand::RemoveBlanks => "remove_blanks",
            PluginCommand::ReplaceUmlauts => "replace_umlauts",
            PluginCommand::TabToSpace => "tab_to_space",
            PluginCommand::Uppercase => "uppercase",
            PluginCommand::RemoveEmptyLines => "remove_empty_lines",
            PluginCommand::RemoveSpecials => "remove_specials",
            PluginCommand::HtmlToRtf => "html_to_rtf",
            PluginCommand::Quote => "quote",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PluginCommand::ShowContents => "Show contents",
            PluginCommand::Replace => "Replace…",
            PluginCommand::StripNumbers => "Strip leading numbers",
            PluginCommand::RemoveBlanks => "Remove blanks",
            PluginCommand::ReplaceUmlauts => "Replace umlauts",
            PluginCommand::TabToSpace => "Tabs to spaces",
            PluginCommand::Uppercase => "Uppercase",
            PluginCommand::RemoveEmptyLines => "Remove empty lines",
            PluginCommand::RemoveSpecials => "Remove special characters",
            PluginCommand::HtmlToRtf => "HTML to RTF",
            PluginCommand::Quote => "Quote for e-mail",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command| command.id().eq_ignore_ascii_case(id))
    }

    pub fn review(&self) -> Option<Review> {
        match self {
            PluginCommand::ShowContents => Some(Review::Show),
            PluginCommand::Replace => Some(Review::Replace),
            _ => None,
        }
    }

    /// Reviewed commands pass the text through; the user decides what happens to it.
    pub fn apply(&self, input: &str) -> String {
        match self {
            PluginCommand::ShowContents | PluginCommand::Replace => input.to_string(),
            PluginCommand::StripNumbers => per_line(input, true, strip_numbers),
            PluginCommand::RemoveBlanks => input.replace(' ', ""),
            PluginCommand::ReplaceUmlauts => per_line(input, true, replace_umlauts),
            PluginCommand::TabToSpace => per_line(input, true, |line| line.replace('\t', "  ")),
            PluginCommand::Uppercase => input.to_uppercase(),
            PluginCommand::RemoveEmptyLines => per_line(input, false, str::to_string),
            PluginCommand::RemoveSpecials => per_line(input, false, remove_specials),
            PluginCommand::HtmlToRtf => html_to_rtf(input),
            PluginCommand::Quote => quote(input),
        }
    }
}

#[derive(Debug, Default)]
pub struct BuiltinPlugins;

impl PluginHost for BuiltinPlugins {
    fn menu_items(&self) -> Vec<(String, String)> {
        PluginCommand::ALL
            .iter()
            .map(|command| (command.label().to_string(), command.id().to_string()))
            .collect()
    }

    fn invoke(&self, command: &str, input: &str) -> Result<String, PluginError> {
        PluginCommand::from_id(command)
            .map(|kind| kind.apply(input))
            .ok_or_else(|| PluginError::UnknownCommand(command.to_string()))
    }

    fn review(&self, command: &str) -> Option<Review> {
        PluginCommand::from_id(command).and_then(|kind| kind.review())
    }
}

/// Regex find/replace over the whole text; `$1` style group references work in `replacement`.
pub fn replace_all(input: &str, pattern: &str, replacement: &str) -> Result<String, PluginError> {
    let re = Regex::new(pattern)?;
    Ok(re.replace_all(input, replacement).into_owned())
}

/// Splits on `\n`, dropping a `\r` before it, and joins with `\n`.
fn per_line(input: &str, keep_empty: bool, f: impl Fn(&str) -> String) -> String {
    let input = input.strip_suffix('\n').unwrap_or(input);
    input
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(f)
        .filter(|line| keep_empty || !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_numbers(line: &str) -> String {
    match line.char_indices().find(|(_, ch)| ch.is_alphabetic()) {
        Some((pos, _)) => line[pos..].to_string(),
        None => line.to_string(),
    }
}

fn replace_umlauts(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            'ä' => out.push_str("ae"),
            'Ä' => out.push_str("Ae"),
            'ö' => out.push_str("oe"),
            'Ö' => out.push_str("Oe"),
            'ü' => out.push_str("ue"),
            'Ü' => out.push_str("Ue"),
            'ß' => out.push_str("ss"),
            _ => out.push(ch),
        }
    }
    out
}

fn remove_specials(line: &str) -> String {
    replace_umlauts(line)
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '.' | '-'))
        .collect()
}

fn quote(input: &str) -> String {
    let mut out = String::new();
    let mut line = String::new();
    for word in input.split_whitespace() {
        if !line.is_empty() && line.chars().count() + word.chars().count() >= QUOTE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        line.push_str(if line.is_empty() { "> " } else { " " });
        line.push_str(word);
    }
    out.push_str(&line);
    out.trim().to_string()
}

/// Minimal HTML to RTF: bold, italic, underline, line and paragraph breaks.
/// Unknown tags are dropped, their text kept.
fn html_to_rtf(html: &str) -> String {
    let html = html.replace(['\r', '\n'], "");
    let mut body = String::new();
    let mut last = 0;
    for caps in TAG_RE.captures_iter(&html) {
        let Some(tag) = caps.get(0) else { continue };
        push_rtf_text(&mut body, &decode_entities(&html[last..tag.start()]));
        last = tag.end();
        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        let name = caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        match (name.as_str(), closing) {
            ("b" | "strong", false) => body.push_str("{\\b "),
            ("i" | "em", false) => body.push_str("{\\i "),
            ("u", false) => body.push_str("{\\ul "),
            ("b" | "strong" | "i" | "em" | "u", true) => body.push('}'),
            ("br", _) => body.push_str("\\line "),
            ("p" | "div", true) => body.push_str("\\par "),
            _ => {}
        }
    }
    push_rtf_text(&mut body, &decode_entities(&html[last..]));
    format!("{{\\rtf1\\ansi\\deff0{{\\fonttbl{{\\f0 Helvetica;}}}}\\f0 {body}}}")
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => name
                    .strip_prefix('#')
                    .and_then(|num| num.parse::<u32>().ok())
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn push_rtf_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{}?", *unit as i16));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::RTF_MARKER;

    #[test]
    fn every_menu_item_is_invocable() {
        let host = BuiltinPlugins;
        for (_, id) in host.menu_items() {
            assert!(host.invoke(&id, "x").is_ok(), "{id}");
        }
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(matches!(
            BuiltinPlugins.invoke("rot13", "abc"),
            Err(PluginError::UnknownCommand(_))
        ));
    }

    #[test]
    fn strip_numbers_per_line() {
        let out = PluginCommand::StripNumbers.apply("1. First\n 23) Second\n42");
        assert_eq!(out, "First\nSecond\n42");
    }

    #[test]
    fn umlauts_are_spelled_out() {
        assert_eq!(
            PluginCommand::ReplaceUmlauts.apply("Grüße aus Köln"),
            "Gruesse aus Koeln"
        );
    }

    #[test]
    fn remove_specials_keeps_words_and_dots() {
        assert_eq!(
            PluginCommand::RemoveSpecials.apply("Hällo, (world) v1.2-b!\n\n\tok"),
            "Haello world v1.2-b\nok"
        );
    }

    #[test]
    fn empty_lines_are_dropped() {
        assert_eq!(PluginCommand::RemoveEmptyLines.apply("a\r\n\r\nb\n"), "a\nb");
    }

    #[test]
    fn tabs_become_two_spaces() {
        assert_eq!(PluginCommand::TabToSpace.apply("a\tb"), "a  b");
    }

    #[test]
    fn per_line_commands_join_with_newline() {
        assert_eq!(
            PluginCommand::TabToSpace.apply("a\tb\r\n\r\nc\td\n"),
            "a  b\n\nc  d"
        );
        assert_eq!(PluginCommand::ReplaceUmlauts.apply("\nü\n"), "\nue");
    }

    #[test]
    fn reviewed_commands_pass_text_through() {
        let host = BuiltinPlugins;
        assert_eq!(host.review("show_contents"), Some(Review::Show));
        assert_eq!(host.review("REPLACE"), Some(Review::Replace));
        assert_eq!(host.review("uppercase"), None);
        assert_eq!(host.invoke("replace", "Grüße").unwrap(), "Grüße");
        let ids: Vec<String> = host.menu_items().into_iter().map(|(_, id)| id).collect();
        assert_eq!(ids[..2], ["show_contents", "replace"]);
    }

    #[test]
    fn replace_all_uses_regex_syntax() {
        assert_eq!(
            replace_all("2024-01-31 and 2025-12-01", r"(\d+)-(\d+)-(\d+)", "$3.$2.$1").unwrap(),
            "31.01.2024 and 01.12.2025"
        );
        assert_eq!(replace_all("a.b.c", r"\.", "/").unwrap(), "a/b/c");
        assert!(matches!(
            replace_all("abc", "(", "x"),
            Err(PluginError::Pattern(_))
        ));
    }

    #[test]
    fn quote_wraps_and_prefixes() {
        let input = "the quick brown fox jumps over the lazy dog and keeps running far away";
        let out = PluginCommand::Quote.apply(input);
        assert!(out.lines().count() > 1);
        for line in out.lines() {
            assert!(line.starts_with("> "), "{line}");
            assert!(line.chars().count() < QUOTE_WIDTH + 10);
        }
        assert_eq!(out.replace("\n> ", " ").trim_start_matches("> "), input);
    }

    #[test]
    fn html_to_rtf_produces_rich_text() {
        let out = PluginCommand::HtmlToRtf.apply("<p>Hello <strong>bold</strong> &amp; <em>it</em><br>ü</p>");
        assert!(out.starts_with(RTF_MARKER));
        assert!(out.contains("{\\b bold}"));
        assert!(out.contains("{\\i it}"));
        assert!(out.contains("& "));
        assert!(out.contains("\\line "));
        assert!(out.contains("\\u252?"));
        assert!(out.contains("\\par "));
        assert!(out.is_ascii());
    }
}

//! Preprocessor — tokenization, case folding, lemmatization, stop words.
//!
//! Pure and deterministic. Empty input yields an empty token list. The raw
//! string is kept alongside the tokens because recognizers need verbatim
//! spans (`192.168.1.1` must never be lemmatized).

use std::sync::LazyLock;

use pc_protocol::{Span, Token, TokenTag};
use regex::Regex;

/// One token: a run of word characters (with inner `.`, `/`, `:`, `-`, `'`,
/// `@`, `~`), or a single non-space symbol.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w/~][\w./:\-~'@]*[\w/]|[\w/~]|[^\s\w]").unwrap()
});

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "for", "in", "on", "at", "by", "with", "and", "or", "but",
    "it", "its", "it's", "this", "that", "these", "those", "them", "they", "one", "same",
    "is", "are", "was", "were", "be", "been", "am", "i", "me", "my", "we", "our", "you",
    "your", "please", "can", "could", "would", "should", "will", "shall", "do", "does",
    "did", "just", "then", "than", "so", "some", "any", "all", "now", "from", "into", "what",
    "what's", "how", "let", "lets", "let's", "there", "here", "as", "also", "again", "too",
    "want", "like", "need",
];

/// Words whose trailing `s`, `ing` or `ed` is not an inflection.
const NO_STRIP: &[&str] = &[
    "its", "this", "is", "was", "has", "does", "status", "dns", "https", "always", "alias",
    "string", "ping", "thing", "nothing", "something", "everything", "bring", "during",
    "morning", "evening", "speed", "seed", "feed", "need", "embed", "shred", "hundred",
    "kubernetes", "plus", "bonus", "nginx", "redis", "series",
];

/// Irregular or domain-specific forms mapped straight to their lemma.
const IRREGULAR: &[(&str, &str)] = &[
    ("ran", "run"),
    ("was", "be"),
    ("were", "be"),
    ("is", "be"),
    ("are", "be"),
    ("been", "be"),
    ("has", "have"),
    ("had", "have"),
    ("did", "do"),
    ("done", "do"),
    ("made", "make"),
    ("took", "take"),
    ("gave", "give"),
    ("spun", "spin"),
    ("added", "add"),
    ("adding", "add"),
    ("brought", "bring"),
    ("began", "begin"),
    ("vms", "vm"),
    ("cts", "ct"),
    ("lxcs", "lxc"),
    ("ips", "ip"),
    ("cpus", "cpu"),
    ("vcpus", "vcpu"),
    ("mem", "memory"),
    ("ram", "memory"),
    ("reboot", "restart"),
    ("rebooting", "restart"),
    ("rebooted", "restart"),
    ("kill", "stop"),
    ("poweroff", "stop"),
];

/// Stems that lose a silent `e` before `-ing` / `-ed`.
const E_STEMS: &[&str] = &[
    "creat", "delet", "remov", "resiz", "increas", "decreas", "schedul", "configur",
    "restor", "updat", "migrat", "enabl", "disabl", "us", "mov", "sav", "clon", "releas",
    "shar", "stor", "mak", "tak", "giv", "serv", "receiv", "generat", "allocat", "reduc",
    "chang", "archiv", "replac", "upgrad", "downgrad", "nam", "provid", "writ", "expos",
    "recreat", "assign", "secur",
];

/// Preprocessor output: the untouched input plus its token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub raw: String,
    pub tokens: Vec<Token>,
}

impl Preprocessed {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Lemmas of tokens that carry meaning (no stop words, no punctuation).
    pub fn content_lemmas(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter(|t| t.is_content())
            .map(|t| t.lemma.as_str())
            .collect()
    }

    /// Whether any token (stop words included) has this lemma.
    pub fn has_lemma(&self, lemma: &str) -> bool {
        self.tokens.iter().any(|t| t.lemma == lemma)
    }
}

/// Tokenize and annotate a raw utterance.
pub fn preprocess(raw: &str) -> Preprocessed {
    let tokens = TOKEN_RE
        .find_iter(raw)
        .map(|m| {
            let surface = m.as_str();
            let tag = classify(surface);
            let lower = surface.to_lowercase();
            let stop = tag == TokenTag::Word && STOP_WORDS.contains(&lower.as_str());
            let lemma = if tag == TokenTag::Word && !stop {
                lemmatize(&lower)
            } else {
                lower
            };
            Token {
                surface: surface.to_string(),
                lemma,
                span: Span::new(m.start(), m.end()),
                tag,
                stop,
            }
        })
        .collect();

    Preprocessed {
        raw: raw.to_string(),
        tokens,
    }
}

fn classify(surface: &str) -> TokenTag {
    if !surface.chars().any(char::is_alphanumeric) {
        return TokenTag::Punct;
    }
    if surface.chars().any(char::is_alphabetic)
        && surface
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, '-' | '_' | '\''))
    {
        return TokenTag::Word;
    }
    if is_number(surface) {
        return TokenTag::Number;
    }
    TokenTag::Symbol
}

fn is_number(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let int = parts.next().unwrap_or_default();
    let frac = parts.next();
    !int.is_empty()
        && int.chars().all(|c| c.is_ascii_digit())
        && frac.is_none_or(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

/// Rule-based lemmatizer for lowercase words.
pub fn lemmatize(word: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR.iter().find(|(form, _)| *form == word) {
        return (*lemma).to_string();
    }
    if NO_STRIP.contains(&word) || word.len() <= 3 {
        return word.to_string();
    }

    if let Some(stem) = word.strip_suffix("ies")
        && stem.len() >= 2
    {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ied")
        && stem.len() >= 2
    {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ing")
        && stem.len() >= 2
    {
        return restore_stem(stem);
    }
    if let Some(stem) = word.strip_suffix("ed")
        && stem.len() >= 2
    {
        return restore_stem(stem);
    }
    if let Some(stem) = word.strip_suffix("es")
        && ["sh", "ch", "x", "z", "ss"].iter().any(|s| stem.ends_with(s))
    {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix('s')
        && !["ss", "us", "is", "os"].iter().any(|s| word.ends_with(s))
    {
        return stem.to_string();
    }
    word.to_string()
}

/// Undo consonant doubling and silent-`e` loss after stripping a suffix.
fn restore_stem(stem: &str) -> String {
    let bytes = stem.as_bytes();
    let n = bytes.len();
    if n >= 3
        && bytes[n - 1].is_ascii_alphabetic()
        && bytes[n - 1] == bytes[n - 2]
        && !matches!(bytes[n - 1], b'l' | b's' | b'z' | b'e')
    {
        return stem[..n - 1].to_string();
    }
    if E_STEMS.contains(&stem) {
        return format!("{stem}e");
    }
    stem.to_string()
}

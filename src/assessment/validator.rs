// src/assessment/validator.rs

//! Screening of free-form answers before they are sent to the scorer.
//!
//! Each rule is a named predicate; rules run in order and the first match
//! decides the rejection reason shown to the learner.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SHORT_FRAGMENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]{1,3}(\s+[a-z]{1,3}){0,5}$").expect("fragment pattern is valid")
});

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]{3,}").expect("word pattern is valid"));

const KEYBOARD_ROWS: [&str; 3] = ["qwertyuiop", "asdfghjkl", "zxcvbnm"];

const FILLER_TOKENS: [&str; 14] = [
    "asdf", "qwerty", "zxcv", "hjkl", "uiop", "aaa", "bbb", "ccc", "xxx", "yyy", "zzz",
    "test", "blah", "lol",
];

const MIN_ANSWER_CHARS: usize = 3;
const MIN_ALPHA_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooShort,
    NonAlphabetic,
    GibberishPattern,
    NoRealWords,
    KnownGibberish,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::TooShort => "Answer is too short or empty.",
            RejectReason::NonAlphabetic => "Answer is mostly non-alphabetic characters.",
            RejectReason::GibberishPattern => "Answer looks like random key presses.",
            RejectReason::NoRealWords => "Answer contains no real words.",
            RejectReason::KnownGibberish => "Answer only contains filler words.",
        }
    }
}

/// Outcome of screening one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acceptance {
    pub accepted: bool,
    pub reason: Option<RejectReason>,
}

type Rule = (RejectReason, fn(&str) -> bool);

/// Ordered rejection rules. Each predicate receives the trimmed answer.
const RULES: [Rule; 5] = [
    (RejectReason::TooShort, is_too_short),
    (RejectReason::NonAlphabetic, is_mostly_non_alphabetic),
    (RejectReason::GibberishPattern, is_gibberish_pattern),
    (RejectReason::NoRealWords, has_no_real_words),
    (RejectReason::KnownGibberish, is_only_filler),
];

pub fn is_acceptable(answer: &str) -> Acceptance {
    match check(answer) {
        Ok(()) => Acceptance { accepted: true, reason: None },
        Err(reason) => Acceptance { accepted: false, reason: Some(reason) },
    }
}

pub fn check(answer: &str) -> Result<(), RejectReason> {
    let trimmed = answer.trim();
    match RULES.iter().find(|(_, rejects)| rejects(trimmed)) {
        Some((reason, _)) => Err(*reason),
        None => Ok(()),
    }
}

pub fn is_too_short(trimmed: &str) -> bool {
    trimmed.chars().count() < MIN_ANSWER_CHARS
}

pub fn is_mostly_non_alphabetic(trimmed: &str) -> bool {
    let total = trimmed.chars().count();
    if total == 0 {
        return true;
    }
    let alpha = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    (alpha as f64 / total as f64) < MIN_ALPHA_RATIO
}

pub fn is_gibberish_pattern(trimmed: &str) -> bool {
    is_keyboard_run(trimmed)
        || is_short_fragments(trimmed)
        || has_no_ascii_letters(trimmed)
        || is_repeated_unit(trimmed)
}

pub fn has_no_real_words(trimmed: &str) -> bool {
    !WORD_RE.is_match(trimmed)
}

pub fn is_only_filler(trimmed: &str) -> bool {
    let mut words = WORD_RE.find_iter(trimmed).peekable();
    if words.peek().is_none() {
        return false;
    }
    words.all(|w| is_filler_token(&w.as_str().to_ascii_lowercase()))
}

/// Every whitespace-separated token walks along one keyboard row, e.g. "qwerty".
pub fn is_keyboard_run(trimmed: &str) -> bool {
    let lower = trimmed.to_ascii_lowercase();
    let mut tokens = lower.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return false;
    }
    tokens.all(|token| {
        let chars: Vec<char> = token.chars().collect();
        chars.len() >= 3
            && chars.iter().all(|c| c.is_ascii_lowercase())
            && chars.windows(2).all(|pair| keys_adjacent(pair[0], pair[1]))
    })
}

/// One to six groups of one to three letters, e.g. "ab cd ef".
pub fn is_short_fragments(trimmed: &str) -> bool {
    SHORT_FRAGMENTS_RE.is_match(trimmed)
}

pub fn has_no_ascii_letters(trimmed: &str) -> bool {
    !trimmed.chars().any(|c| c.is_ascii_alphabetic())
}

/// A unit of up to three characters repeated at least three times, e.g. "ababab".
pub fn is_repeated_unit(trimmed: &str) -> bool {
    let chars: Vec<char> = trimmed.to_lowercase().chars().collect();
    (1..=3).any(|unit| {
        chars.len() >= unit * 3
            && chars.len() % unit == 0
            && chars.chunks(unit).all(|chunk| chunk == &chars[..unit])
    })
}

fn is_filler_token(token: &str) -> bool {
    if FILLER_TOKENS.contains(&token) {
        return true;
    }
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => false,
    }
}

fn key_position(c: char) -> Option<(usize, usize)> {
    KEYBOARD_ROWS
        .iter()
        .enumerate()
        .find_map(|(row, keys)| keys.find(c).map(|col| (row, col)))
}

fn keys_adjacent(a: char, b: char) -> bool {
    match (key_position(a), key_position(b)) {
        (Some((row_a, col_a)), Some((row_b, col_b))) => {
            row_a == row_b && col_a.abs_diff(col_b) == 1
        }
        _ => false,
    }
}

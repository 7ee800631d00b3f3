//! Length-constrained message composition shared by all channels
//!
//! A message is `head + sep + abstract + sep + link + suffix`. Only the abstract may be
//! shortened; when it has to be, it is cut to exactly the remaining budget and ends with
//! [`TRUNCATION_MARKER`]. Lengths are measured with the platform's own [`LengthRule`].

use crate::error::FormatError;

pub const TRUNCATION_MARKER: &str = "...";

/// Length every link is counted as on platforms that wrap links
pub const WRAPPED_LINK_LENGTH: usize = 23;

/// How a platform counts message length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthRule {
    /// One unit per Unicode scalar value, links counted as written
    Chars,
    /// One unit per UTF-16 code unit, links counted as written
    Utf16,
    /// One unit per scalar value, every link counts as 23
    Mastodon,
    /// Weighted counting: scalar values outside the Latin and general punctuation ranges
    /// (emoji, CJK, ...) weigh 2, every link counts as 23. Counting per scalar value
    /// overestimates multi-codepoint emoji sequences, never underestimates.
    Twitter,
}

/// One measured piece of text: a single character or a whole link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unit {
    end: usize,
    weight: usize,
}

impl LengthRule {
    pub fn char_weight(self, c: char) -> usize {
        match self {
            LengthRule::Chars | LengthRule::Mastodon => 1,
            LengthRule::Utf16 => c.len_utf16(),
            LengthRule::Twitter => match c as u32 {
                0..=4351 | 8192..=8205 | 8208..=8223 | 8242..=8247 => 1,
                _ => 2,
            },
        }
    }

    fn wraps_links(self) -> bool {
        matches!(self, LengthRule::Mastodon | LengthRule::Twitter)
    }

    pub fn text_len(self, text: &str) -> usize {
        self.units(text).iter().map(|unit| unit.weight).sum()
    }

    pub fn link_len(self, url: &str) -> usize {
        if self.wraps_links() {
            WRAPPED_LINK_LENGTH
        } else {
            self.text_len(url)
        }
    }

    /// Longest prefix of `text` whose length fits in `budget`, never ending inside a link
    pub fn take_within(self, text: &str, budget: usize) -> &str {
        let mut used = 0;
        let mut start = 0;
        for unit in self.units(text) {
            if used + unit.weight > budget {
                return &text[..start];
            }
            used += unit.weight;
            start = unit.end;
        }
        text
    }

    /// Splits `text` into characters and, on link-wrapping platforms, whole links
    fn units(self, text: &str) -> Vec<Unit> {
        let mut units = Vec::new();
        let mut idx = 0;
        while let Some(c) = text[idx..].chars().next() {
            if let Some((len, weight)) = self.link_at(text, idx) {
                idx += len;
                units.push(Unit { end: idx, weight });
                continue;
            }
            idx += c.len_utf8();
            units.push(Unit {
                end: idx,
                weight: self.char_weight(c),
            });
        }
        units
    }

    /// Byte length and weight of a link starting at `idx`, if any
    ///
    /// Links that start a word count exactly as wrapped. Anything the platform might
    /// leave unlinked counts as the larger of its written and wrapped length.
    fn link_at(self, text: &str, idx: usize) -> Option<(usize, usize)> {
        if !self.wraps_links() {
            return None;
        }

        let rest = &text[idx..];
        let word_start = text[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| c.is_whitespace() || "([{<\"'".contains(c));
        let token = rest
            .split(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .trim_end_matches(|c: char| ".,;:!?)]}>\"'".contains(c));

        let written = || token.chars().map(|c| self.char_weight(c)).sum::<usize>();

        if has_scheme(token) {
            let weight = if word_start {
                WRAPPED_LINK_LENGTH
            } else {
                written().max(WRAPPED_LINK_LENGTH)
            };
            return Some((token.len(), weight));
        }

        if self == LengthRule::Twitter && word_start && is_bare_domain(token) {
            return Some((token.len(), written().max(WRAPPED_LINK_LENGTH)));
        }

        None
    }
}

fn has_scheme(token: &str) -> bool {
    ["https://", "http://"].iter().any(|scheme| {
        token.len() > scheme.len()
            && token
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// `example.com`, `a.io/path`: what Twitter links without a scheme
fn is_bare_domain(token: &str) -> bool {
    let host = token.split('/').next().unwrap_or_default();
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let valid_labels = labels
        .iter()
        .all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    let tld = labels[labels.len() - 1];
    valid_labels && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Everything in a message except the abstract
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decorative prefix plus the title
    pub head: String,
    /// Placed between head, abstract and link block
    pub separator: String,
    /// Text right before the link (e.g. an opening anchor tag)
    pub link_prefix: String,
    pub url: String,
    /// Text after the link, including decorative suffixes such as hashtags
    pub link_suffix: String,
    /// Per-character escaping applied to the abstract when composing (e.g. HTML)
    pub escape: Option<fn(&str) -> String>,
}

impl Frame {
    fn tail(&self) -> String {
        format!("{}{}{}", self.link_prefix, self.url, self.link_suffix)
    }

    pub fn new(head: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            head: head.into(),
            separator: "\n\n".to_string(),
            link_prefix: String::new(),
            url: url.into(),
            link_suffix: String::new(),
            escape: None,
        }
    }

    fn escaped<'a>(&self, summary: &'a str) -> std::borrow::Cow<'a, str> {
        match self.escape {
            Some(escape) => std::borrow::Cow::Owned(escape(summary)),
            None => std::borrow::Cow::Borrowed(summary),
        }
    }

    fn compose(&self, summary: Option<&str>) -> String {
        match summary {
            Some(summary) => format!(
                "{}{sep}{}{sep}{}",
                self.head,
                self.escaped(summary),
                self.tail(),
                sep = self.separator
            ),
            None => format!("{}{}{}", self.head, self.separator, self.tail()),
        }
    }
}

/// Per-platform ceiling and counting rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_length: usize,
    pub rule: LengthRule,
}

impl Limits {
    pub fn new(max_length: usize, rule: LengthRule) -> Self {
        Self { max_length, rule }
    }

    /// Measured length of a composed message built from `frame`
    pub fn measure(&self, frame: &Frame, summary: Option<&str>) -> usize {
        let rule = self.rule;
        let without = rule.text_len(&frame.head)
            + rule.text_len(&frame.separator)
            + rule.text_len(&frame.link_prefix)
            + rule.link_len(&frame.url)
            + rule.text_len(&frame.link_suffix);

        match summary {
            Some(summary) => {
                without + rule.text_len(&frame.separator) + rule.text_len(&frame.escaped(summary))
            }
            None => without,
        }
    }

    /// Longest prefix of the abstract whose composed length fits in `budget`
    fn take_summary<'a>(&self, frame: &Frame, summary: &'a str, budget: usize) -> &'a str {
        let Some(escape) = frame.escape else {
            return self.rule.take_within(summary, budget);
        };

        let mut used = 0;
        let mut buf = [0u8; 4];
        for (idx, c) in summary.char_indices() {
            let weight = self.rule.text_len(&escape(c.encode_utf8(&mut buf)));
            if used + weight > budget {
                return &summary[..idx];
            }
            used += weight;
        }
        summary
    }

    /// Composes the message, truncating only the abstract when over the ceiling
    pub fn fit(&self, platform: &str, frame: &Frame, summary: &str) -> Result<String, FormatError> {
        let rule = self.rule;
        let bare = self.measure(frame, None);
        if bare > self.max_length {
            return Err(FormatError::Overflow {
                platform: platform.to_string(),
                required: bare,
                limit: self.max_length,
            });
        }

        let summary = summary.trim();
        if summary.is_empty() {
            return Ok(frame.compose(None));
        }

        if self.measure(frame, Some(summary)) <= self.max_length {
            return Ok(frame.compose(Some(summary)));
        }

        let fixed = bare + rule.text_len(&frame.separator) + rule.text_len(TRUNCATION_MARKER);
        if fixed > self.max_length {
            return Ok(frame.compose(None));
        }

        // A cut can turn the tail of the abstract into something the platform links,
        // so the composed result is measured again and the budget shrunk until it fits.
        let mut budget = self.max_length - fixed;
        loop {
            let kept = self.take_summary(frame, summary, budget).trim_end();
            if kept.is_empty() {
                return Ok(frame.compose(None));
            }

            let truncated = format!("{}{}", kept, TRUNCATION_MARKER);
            let used = self.measure(frame, Some(&truncated));
            if used <= self.max_length {
                return Ok(frame.compose(Some(&truncated)));
            }
            budget = budget.saturating_sub(used - self.max_length);
        }
    }
}

/// Keeps the first `max` tags in their original order
pub fn limit_tags(mut tags: Vec<String>, max: Option<usize>) -> Vec<String> {
    if let Some(max) = max {
        tags.truncate(max);
    }
    tags
}

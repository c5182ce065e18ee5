//! Delimiter scanning.
//!
//! Both scanners are fed one span at a time and keep their state between
//! calls, so a delimiter split across two buffer reads is still found.
//!
//! - [`TextScan`] finds the next left delimiter in literal text. Inside
//!   expanded values it skips occurrences preceded by `\`.
//! - [`CloseScan`] finds the right delimiter that closes a token body,
//!   ignoring quoted regions and balancing nested delimiter pairs.

/// Something [`find_unquoted`] can look for.
pub trait Pattern: Copy {
    fn is_prefix_of(self, text: &str) -> bool;
}

impl Pattern for &str {
    fn is_prefix_of(self, text: &str) -> bool {
        text.starts_with(self)
    }
}

impl Pattern for char {
    fn is_prefix_of(self, text: &str) -> bool {
        text.starts_with(self)
    }
}

/// Escape character for delimiters inside expanded values and quoted strings.
pub const ESCAPE: char = '\\';

/// Quote character for regions the close search ignores.
pub const QUOTE: char = '"';

/// Result of feeding one span to a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStep {
    /// Characters of the span consumed
    pub consumed: usize,
    /// Whether the delimiter was found (within the consumed part)
    pub found: bool,
}

// ============================================================================
// Incremental matcher
// ============================================================================

/// Incremental (KMP) matcher for a fixed delimiter.
#[derive(Debug, Clone)]
pub struct DelimiterMatcher {
    pattern: Vec<char>,
    failure: Vec<usize>,
    matched: usize,
}

impl DelimiterMatcher {
    pub fn new(delimiter: &str) -> Self {
        let pattern: Vec<char> = delimiter.chars().collect();
        let mut failure = vec![0; pattern.len()];
        let mut k = 0;
        for i in 1..pattern.len() {
            while k > 0 && pattern[i] != pattern[k] {
                k = failure[k - 1];
            }
            if pattern[i] == pattern[k] {
                k += 1;
            }
            failure[i] = k;
        }
        Self {
            pattern,
            failure,
            matched: 0,
        }
    }

    /// Feed one character; true when it completes a match.
    pub fn feed(&mut self, c: char) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        while self.matched > 0 && self.pattern[self.matched] != c {
            self.matched = self.failure[self.matched - 1];
        }
        if self.pattern[self.matched] == c {
            self.matched += 1;
        }
        if self.matched == self.pattern.len() {
            self.matched = 0;
            return true;
        }
        false
    }

    /// Length of the partial match carried into the next span.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// UTF-8 length of the partial match.
    pub fn matched_bytes(&self) -> usize {
        self.pattern[..self.matched]
            .iter()
            .map(|c| c.len_utf8())
            .sum()
    }

    pub fn reset(&mut self) {
        self.matched = 0;
    }
}

// ============================================================================
// Left delimiter search
// ============================================================================

/// Search for the left delimiter in literal text.
#[derive(Debug, Clone)]
pub struct TextScan {
    left: DelimiterMatcher,
    left_len: usize,
    escapes: bool,
}

impl TextScan {
    /// Plain search used on the template input.
    pub fn new(left: &str) -> Self {
        Self {
            left: DelimiterMatcher::new(left),
            left_len: left.len(),
            escapes: false,
        }
    }

    /// Escape-aware search used on expanded values.
    pub fn unescaped(left: &str) -> Self {
        Self {
            escapes: true,
            ..Self::new(left)
        }
    }

    /// Scan `span`, appending literal text to `literal`.
    ///
    /// On a match the delimiter itself is not part of `literal`. An escaped
    /// delimiter stays in `literal` without its escape character.
    pub fn scan(&mut self, span: &[char], literal: &mut String) -> ScanStep {
        for (i, &c) in span.iter().enumerate() {
            literal.push(c);
            if !self.left.feed(c) {
                continue;
            }
            let before = literal.len() - self.left_len;
            if self.escapes && literal[..before].ends_with(ESCAPE) {
                literal.remove(before - ESCAPE.len_utf8());
                continue;
            }
            literal.truncate(before);
            return ScanStep {
                consumed: i + 1,
                found: true,
            };
        }
        ScanStep {
            consumed: span.len(),
            found: false,
        }
    }

    /// Trailing bytes of the pending literal that may still begin a delimiter.
    pub fn pending_bytes(&self) -> usize {
        self.left.matched_bytes()
    }

    pub fn reset(&mut self) {
        self.left.reset();
    }
}

// ============================================================================
// Token body close search
// ============================================================================

/// Search for the right delimiter closing a token body.
#[derive(Debug, Clone)]
pub struct CloseScan {
    left: DelimiterMatcher,
    right: DelimiterMatcher,
    right_len: usize,
    /// Left and right delimiters differ, so pairs can nest
    nests: bool,
    quoted: bool,
    escaped: bool,
    depth: usize,
    body: String,
}

impl CloseScan {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: DelimiterMatcher::new(left),
            right: DelimiterMatcher::new(right),
            right_len: right.len(),
            nests: left != right,
            quoted: false,
            escaped: false,
            depth: 0,
            body: String::new(),
        }
    }

    /// Scan `span`, collecting the token body.
    pub fn scan(&mut self, span: &[char]) -> ScanStep {
        for (i, &c) in span.iter().enumerate() {
            if self.feed(c) {
                return ScanStep {
                    consumed: i + 1,
                    found: true,
                };
            }
        }
        ScanStep {
            consumed: span.len(),
            found: false,
        }
    }

    fn feed(&mut self, c: char) -> bool {
        self.body.push(c);

        if self.quoted {
            if self.escaped {
                self.escaped = false;
            } else if c == ESCAPE {
                self.escaped = true;
            } else if c == QUOTE {
                self.quoted = false;
            }
            return false;
        }
        if c == QUOTE {
            self.quoted = true;
            self.left.reset();
            self.right.reset();
            return false;
        }

        let closes = self.right.feed(c);
        let opens = self.nests && self.left.feed(c);
        if closes {
            if self.depth == 0 {
                let end = self.body.len() - self.right_len;
                self.body.truncate(end);
                return true;
            }
            self.depth -= 1;
            self.left.reset();
        } else if opens {
            self.depth += 1;
            self.right.reset();
        }
        false
    }

    /// The body collected so far, without the closing delimiter.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

/// If `text` is exactly one balanced delimiter pair, return what it wraps.
///
/// `{{x => 1}}` wraps `x => 1`; `{{a}}{{b}}` is two pairs and wraps nothing.
pub fn wrapped_body<'t>(text: &'t str, left: &str, right: &str) -> Option<&'t str> {
    if text.len() < left.len() + right.len() {
        return None;
    }
    let rest = text.strip_prefix(left)?;
    if !rest.ends_with(right) {
        return None;
    }
    let chars: Vec<char> = rest.chars().collect();
    let mut scan = CloseScan::new(left, right);
    let step = scan.scan(&chars);
    if step.found && step.consumed == chars.len() {
        Some(&rest[..rest.len() - right.len()])
    } else {
        None
    }
}

/// Byte offset of the first `pattern` outside double quotes.
pub fn find_unquoted<P: Pattern>(text: &str, pattern: P) -> Option<usize> {
    let mut quoted = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if quoted {
            if escaped {
                escaped = false;
            } else if c == ESCAPE {
                escaped = true;
            } else if c == QUOTE {
                quoted = false;
            }
            continue;
        }
        if c == QUOTE {
            quoted = true;
        } else if pattern.is_prefix_of(&text[i..]) {
            return Some(i);
        }
    }
    None
}

//! Gitignore patterns rewritten as unison `Regex` ignore rules.
//!
//! Unison matches regexes against the whole path relative to the replica
//! root, so every rule is anchored with `^` and extended with `(/.*)?$` to
//! cover everything below a matching directory.

/// One translated rule.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IgnoreRule {
    /// Whether the pattern re-includes paths (`!pattern`).
    pub negated: bool,
    /// Anchored regular expression.
    pub regex: String,
}

impl IgnoreRule {
    /// Single unison argument, `-ignore=Regex …` or `-ignorenot=Regex …`.
    #[must_use]
    pub fn to_unison_arg(&self) -> String {
        let preference = if self.negated { "ignorenot" } else { "ignore" };
        format!("-{preference}=Regex {}", self.regex)
    }
}

/// Translates one gitignore line; comments and blank lines yield `None`.
#[must_use]
pub fn translate_pattern(line: &str) -> Option<IgnoreRule> {
    let trimmed = line.trim_end();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let (negated, body) = trimmed
        .strip_prefix('!')
        .map_or((false, trimmed), |rest| (true, rest));
    let literal = body
        .strip_prefix('\\')
        .filter(|rest| rest.starts_with(['#', '!']))
        .unwrap_or(body);

    let pattern = literal.trim_end_matches('/');
    if pattern.is_empty() {
        return None;
    }
    let anchored = pattern.contains('/');
    let relative = pattern.strip_prefix('/').unwrap_or(pattern);

    let mut regex = String::from("^");
    if !anchored {
        regex.push_str("(.+/)?");
    }
    regex.push_str(&path_to_regex(relative));
    regex.push_str("(/.*)?$");
    Some(IgnoreRule { negated, regex })
}

/// Translates every pattern into unison arguments, preserving order.
#[must_use]
pub fn unison_ignore_args(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .filter_map(|pattern| translate_pattern(pattern))
        .map(|rule| rule.to_unison_arg())
        .collect()
}

fn path_to_regex(relative: &str) -> String {
    let segments: Vec<&str> = relative.split('/').collect();
    let count = segments.len();
    let mut regex = String::new();
    for (index, segment) in segments.into_iter().enumerate() {
        let is_last = index + 1 == count;
        if segment == "**" {
            // Leading and inner `**` match zero or more whole directories.
            regex.push_str(if is_last { ".*" } else { "(.+/)?" });
            continue;
        }
        regex.push_str(&segment_to_regex(segment));
        if !is_last {
            regex.push('/');
        }
    }
    regex
}

fn segment_to_regex(segment: &str) -> String {
    let mut regex = String::new();
    let mut chars = segment.chars();
    while let Some(current) = chars.next() {
        match current {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            '[' => push_class(&mut regex, &mut chars),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut regex, escaped);
                }
            }
            other => push_literal(&mut regex, other),
        }
    }
    regex
}

fn push_class(regex: &mut String, chars: &mut std::str::Chars<'_>) {
    let mut class = String::from("[");
    let mut first = true;
    for current in chars.by_ref() {
        match current {
            '!' if first => class.push('^'),
            ']' if !first => {
                class.push(']');
                regex.push_str(&class);
                return;
            }
            '\\' => class.push_str("\\\\"),
            other => class.push(other),
        }
        first = false;
    }
    // Unterminated class: match the text literally.
    for literal in class.chars() {
        push_literal(regex, literal);
    }
}

fn push_literal(regex: &mut String, value: char) {
    if "\\.+*?()|[]{}^$".contains(value) {
        regex.push('\\');
    }
    regex.push(value);
}

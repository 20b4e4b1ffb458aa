//! Recursive-descent parser from regular-expression text to syntax trees.
//!
//! Supported syntax: alternation `|`, juxtaposition, the postfix operators
//! `*` `+` `?`, groups `(...)`, character classes `[...]` with ranges and
//! `^` negation, `.` (any code point except newline), single-character and
//! `\x`/`\x{...}` escapes, the class escapes `\d` `\s` `\w`, and lexer
//! action markers `:identifier:`. Anchors are not supported. A literal `:`
//! must be written `\:`.

use super::ast::{
    complement_ranges, normalize_ranges, CharRange, RegexNode, TreeBuilder, CODE_POINT_LIMIT,
};
use lalrkit::LalrkitError;
use smartstring::alias::String;
use std::iter::Peekable;
use std::str::Chars;

/// Intern a lexer-action identifier, preserving first-appearance order.
pub(crate) fn intern_action(actions: &mut Vec<String>, name: &str) -> usize {
    match actions.iter().position(|a| a == name) {
        Some(index) => index,
        None => {
            actions.push(String::from(name));
            actions.len() - 1
        }
    }
}

/// Compile a literal token: every character matches itself, no metacharacters.
pub(crate) fn parse_literal(lexeme: &str, builder: &mut TreeBuilder) -> RegexNode {
    let mut node = RegexNode::Empty;
    for ch in lexeme.chars() {
        let leaf = builder.char_leaf(ch);
        node = RegexNode::concat(node, leaf);
    }
    node
}

/// Parse a regular expression into a syntax tree, allocating leaf positions
/// in `builder` and interning `:name:` markers into `actions`.
pub(crate) fn parse_regex(
    pattern: &str,
    line: usize,
    builder: &mut TreeBuilder,
    actions: &mut Vec<String>,
) -> Result<RegexNode, LalrkitError> {
    let mut parser = RegexParser {
        chars: pattern.chars().peekable(),
        line,
        pattern,
        builder,
        actions,
    };
    let node = parser.alternation()?;
    match parser.chars.peek() {
        None => Ok(node),
        Some(&ch) => Err(parser.error(format!("unexpected `{}`", ch))),
    }
}

enum Escaped {
    Char(char),
    Class(Vec<CharRange>),
}

struct RegexParser<'p, 'b> {
    chars: Peekable<Chars<'p>>,
    line: usize,
    pattern: &'p str,
    builder: &'b mut TreeBuilder,
    actions: &'b mut Vec<String>,
}

impl<'p, 'b> RegexParser<'p, 'b> {
    fn error(&self, message: std::string::String) -> LalrkitError {
        LalrkitError::Syntax {
            line: self.line,
            message: format!("in regex {:?}: {}", self.pattern, message).into(),
        }
    }

    fn alternation(&mut self) -> Result<RegexNode, LalrkitError> {
        let mut node = self.concatenation()?;
        while self.chars.peek() == Some(&'|') {
            self.chars.next();
            let right = self.concatenation()?;
            node = RegexNode::alternate(node, right);
        }
        Ok(node)
    }

    fn concatenation(&mut self) -> Result<RegexNode, LalrkitError> {
        let mut node = RegexNode::Empty;
        loop {
            match self.chars.peek() {
                None | Some('|') | Some(')') => break,
                _ => {
                    let next = self.postfix()?;
                    node = RegexNode::concat(node, next);
                }
            }
        }
        Ok(node)
    }

    fn postfix(&mut self) -> Result<RegexNode, LalrkitError> {
        let mut node = self.primary()?;
        loop {
            match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    node = RegexNode::Star(Box::new(node));
                }
                Some('+') => {
                    self.chars.next();
                    node = RegexNode::Plus(Box::new(node));
                }
                Some('?') => {
                    self.chars.next();
                    node = RegexNode::Optional(Box::new(node));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<RegexNode, LalrkitError> {
        let ch = self
            .chars
            .next()
            .ok_or_else(|| self.error("unexpected end of pattern".to_owned()))?;
        match ch {
            '(' => {
                let node = self.alternation()?;
                match self.chars.next() {
                    Some(')') => Ok(node),
                    _ => Err(self.error("unbalanced `(`".to_owned())),
                }
            }
            '[' => self.class(),
            '.' => Ok(self.builder.leaf(vec![
                (0, '\n' as u32),
                ('\n' as u32 + 1, CODE_POINT_LIMIT),
            ])),
            ':' => self.action_marker(),
            '\\' => match self.escape()? {
                Escaped::Char(c) => Ok(self.builder.char_leaf(c)),
                Escaped::Class(ranges) => Ok(self.builder.leaf(ranges)),
            },
            '*' | '+' | '?' => Err(self.error(format!("`{}` with nothing to repeat", ch))),
            other => Ok(self.builder.char_leaf(other)),
        }
    }

    fn action_marker(&mut self) -> Result<RegexNode, LalrkitError> {
        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some(':') => break,
                Some(c) if c.is_alphanumeric() || c == '_' => name.push(c),
                Some(c) => {
                    return Err(self.error(format!("bad character `{}` in action name", c)));
                }
                None => return Err(self.error("unterminated action marker".to_owned())),
            }
        }
        if name.is_empty() || name.chars().next().is_some_and(|c| c.is_numeric()) {
            return Err(self.error("malformed action name".to_owned()));
        }
        let action = intern_action(self.actions, &name);
        Ok(self.builder.action_marker(action))
    }

    fn class(&mut self) -> Result<RegexNode, LalrkitError> {
        let negate = if self.chars.peek() == Some(&'^') {
            self.chars.next();
            true
        } else {
            false
        };
        let mut ranges: Vec<CharRange> = Vec::new();
        loop {
            let ch = self
                .chars
                .next()
                .ok_or_else(|| self.error("unterminated `[`".to_owned()))?;
            let low = match ch {
                ']' => break,
                '\\' => match self.escape()? {
                    Escaped::Char(c) => c,
                    Escaped::Class(sub) => {
                        // class escapes cannot form ranges
                        ranges.extend(sub);
                        continue;
                    }
                },
                c => c,
            };
            // a `-` forms a range unless it closes the class
            if self.chars.peek() == Some(&'-') {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek() != Some(&']') {
                    self.chars.next();
                    let high = match self.chars.next() {
                        Some('\\') => match self.escape()? {
                            Escaped::Char(c) => c,
                            Escaped::Class(_) => {
                                return Err(
                                    self.error("class escape cannot end a range".to_owned())
                                );
                            }
                        },
                        Some(c) => c,
                        None => return Err(self.error("unterminated `[`".to_owned())),
                    };
                    if (high as u32) < (low as u32) {
                        return Err(self.error(format!("empty range `{}-{}`", low, high)));
                    }
                    ranges.push((low as u32, high as u32 + 1));
                    continue;
                }
            }
            ranges.push((low as u32, low as u32 + 1));
        }
        let mut ranges = normalize_ranges(ranges);
        if negate {
            ranges = complement_ranges(&ranges);
        }
        if ranges.is_empty() {
            return Err(self.error("empty character class".to_owned()));
        }
        Ok(self.builder.leaf(ranges))
    }

    fn escape(&mut self) -> Result<Escaped, LalrkitError> {
        let ch = self
            .chars
            .next()
            .ok_or_else(|| self.error("trailing backslash".to_owned()))?;
        let escaped = match ch {
            'n' => Escaped::Char('\n'),
            't' => Escaped::Char('\t'),
            'r' => Escaped::Char('\r'),
            'f' => Escaped::Char('\u{0C}'),
            'v' => Escaped::Char('\u{0B}'),
            '0' => Escaped::Char('\0'),
            'd' => Escaped::Class(vec![('0' as u32, '9' as u32 + 1)]),
            's' => Escaped::Class(vec![
                ('\t' as u32, '\r' as u32 + 1),
                (' ' as u32, ' ' as u32 + 1),
            ]),
            'w' => Escaped::Class(vec![
                ('0' as u32, '9' as u32 + 1),
                ('A' as u32, 'Z' as u32 + 1),
                ('_' as u32, '_' as u32 + 1),
                ('a' as u32, 'z' as u32 + 1),
            ]),
            'x' => Escaped::Char(self.hex_escape()?),
            other => Escaped::Char(other),
        };
        Ok(escaped)
    }

    fn hex_escape(&mut self) -> Result<char, LalrkitError> {
        let mut digits = String::new();
        if self.chars.peek() == Some(&'{') {
            self.chars.next();
            loop {
                match self.chars.next() {
                    Some('}') => break,
                    Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                    _ => return Err(self.error("malformed `\\x{...}` escape".to_owned())),
                }
            }
        } else {
            for _ in 0..2 {
                match self.chars.next() {
                    Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                    _ => return Err(self.error("malformed `\\x` escape".to_owned())),
                }
            }
        }
        let value = u32::from_str_radix(&digits, 16)
            .map_err(|_| self.error("malformed `\\x` escape".to_owned()))?;
        char::from_u32(value).ok_or_else(|| self.error("escape is not a code point".to_owned()))
    }
}

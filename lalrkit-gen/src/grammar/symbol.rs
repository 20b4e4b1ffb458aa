//! Grammar symbols.

use once_cell::sync::Lazy;
use smartstring::alias::String;
use std::collections::{BTreeSet, HashMap};

/// Index of a symbol in [`Grammar::symbols`](super::Grammar::symbols).
pub type SymbolIndex = usize;
/// Index of a production in [`Grammar::productions`](super::Grammar::productions).
pub type ProductionIndex = usize;
/// Index of an action in [`Grammar::actions`](super::Grammar::actions).
pub type ActionIndex = usize;

/// How a symbol participates in the grammar.
///
/// Symbols start out `Null` and are classified as the grammar is built and
/// generated: appearing on a left-hand side makes a symbol a nonterminal,
/// appearing in a precedence directive or carrying a literal/regex lexeme
/// makes it a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolType {
    Null,
    Terminal,
    NonTerminal,
    End,
}

/// What a symbol's lexeme means to the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeType {
    /// No scanner pattern (nonterminals and the distinguished symbols).
    Null,
    /// Matched byte-for-byte after escaping regex metacharacters.
    Literal,
    /// Matched with full regular-expression semantics.
    Regex,
}

/// Associativity assigned by a precedence directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    /// No associativity: an equal-precedence conflict is warned about and
    /// resolved towards shifting.
    None,
    Left,
    Right,
    /// An equal-precedence conflict becomes an error cell.
    Nonassoc,
}

static PUNCTUATION_NAMES: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    [
        ('!', "bang"),
        ('"', "double_quote"),
        ('#', "hash"),
        ('$', "dollar"),
        ('%', "percent"),
        ('&', "amp"),
        ('\'', "quote"),
        ('(', "left_paren"),
        (')', "right_paren"),
        ('*', "star"),
        ('+', "plus"),
        (',', "comma"),
        ('-', "minus"),
        ('.', "dot"),
        ('/', "slash"),
        (':', "colon"),
        (';', "semicolon"),
        ('<', "lt"),
        ('=', "eq"),
        ('>', "gt"),
        ('?', "question"),
        ('@', "at"),
        ('[', "left_bracket"),
        ('\\', "backslash"),
        (']', "right_bracket"),
        ('^', "caret"),
        ('`', "backtick"),
        ('{', "left_brace"),
        ('|', "pipe"),
        ('}', "right_brace"),
        ('~', "tilde"),
    ]
    .into_iter()
    .collect()
});

/// Derive a symbol's identifier from its lexeme.
///
/// Alphanumerics and underscores pass through; every other character is
/// replaced by an underscore-separated name so that `'+'` becomes `plus`
/// and `'<='` becomes `lt_eq`.
pub fn sanitize_identifier(lexeme: &str) -> String {
    let mut out = String::new();
    for ch in lexeme.chars() {
        let piece: &str = if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            continue;
        } else if let Some(&name) = PUNCTUATION_NAMES.get(&ch) {
            name
        } else {
            "char"
        };
        if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
        out.push_str(piece);
        out.push('_');
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("empty");
    }
    out
}

/// A named grammar entity: terminal, nonterminal, or one of the
/// distinguished symbols.
///
/// The lexeme is unique within a grammar's symbol table. `index` is
/// assigned during generation; `nullable`, `first`, and `follow` are filled
/// by the FIRST/FOLLOW pass and are empty before it.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub index: SymbolIndex,
    pub lexeme: String,
    pub identifier: String,
    pub symbol_type: SymbolType,
    pub lexeme_type: LexemeType,
    pub associativity: Associativity,
    /// 0 means no precedence assigned.
    pub precedence: usize,
    /// 1-based line of first appearance; 0 for built-in symbols.
    pub line: usize,
    pub nullable: bool,
    pub first: BTreeSet<SymbolIndex>,
    pub follow: BTreeSet<SymbolIndex>,
    /// Productions whose left-hand side is this symbol, in declaration
    /// order; empty for terminals.
    pub productions: Vec<ProductionIndex>,
}

impl Symbol {
    pub fn new(
        index: SymbolIndex,
        lexeme: &str,
        line: usize,
        lexeme_type: LexemeType,
        symbol_type: SymbolType,
    ) -> Self {
        Self {
            index,
            lexeme: String::from(lexeme),
            identifier: sanitize_identifier(lexeme),
            symbol_type,
            lexeme_type,
            associativity: Associativity::None,
            precedence: 0,
            line,
            nullable: false,
            first: BTreeSet::new(),
            follow: BTreeSet::new(),
            productions: Vec::new(),
        }
    }

    /// Terminals and the end symbol occupy action columns in the tables.
    pub fn is_terminal(&self) -> bool {
        matches!(self.symbol_type, SymbolType::Terminal | SymbolType::End)
    }

    pub fn is_non_terminal(&self) -> bool {
        self.symbol_type == SymbolType::NonTerminal
    }

    /// Does the scanner need a token for this symbol?
    pub fn is_lexed(&self) -> bool {
        self.symbol_type == SymbolType::Terminal
            && !matches!(self.lexeme_type, LexemeType::Null)
    }
}

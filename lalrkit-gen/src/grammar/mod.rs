//! The in-memory grammar model and its builders.
//!
//! A [`Grammar`] is built either by parsing grammar source
//! ([`Grammar::parse`]) or programmatically through the three scope objects
//! returned by [`Grammar::open_directive`], [`Grammar::open_production`],
//! and [`Grammar::open_whitespace`]. Exactly one scope can be alive at a
//! time because each borrows the grammar mutably; illegal interleavings do
//! not compile.
//!
//! The model is mutable only while it is being built and generated; the
//! generator assigns symbol indices and set-valued attributes, after which
//! the grammar should be treated as frozen.

mod lexer;
mod parser;
mod production;
mod symbol;

pub use production::{Action, Directive, LexerToken, LexerTokenKind, Production};
pub use symbol::{
    ActionIndex, Associativity, LexemeType, ProductionIndex, Symbol, SymbolIndex, SymbolType,
    sanitize_identifier,
};

use indexmap::IndexMap;
use lalrkit::LalrkitError;
use smartstring::alias::String;

/// Top-level container for one grammar.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) identifier: String,
    pub(crate) directives: Vec<Directive>,
    pub(crate) symbols: Vec<Symbol>,
    by_lexeme: IndexMap<String, SymbolIndex>,
    pub(crate) productions: Vec<Production>,
    pub(crate) actions: Vec<Action>,
    actions_by_identifier: IndexMap<String, ActionIndex>,
    pub(crate) whitespace_tokens: Vec<LexerToken>,
    start: SymbolIndex,
    end: SymbolIndex,
    error: SymbolIndex,
}

impl Grammar {
    /// Create an empty grammar with the distinguished symbols `.start`,
    /// `.end`, and `.error` in place.
    pub fn new(identifier: &str) -> Self {
        let mut grammar = Self {
            identifier: String::from(identifier),
            directives: Vec::new(),
            symbols: Vec::new(),
            by_lexeme: IndexMap::new(),
            productions: Vec::new(),
            actions: Vec::new(),
            actions_by_identifier: IndexMap::new(),
            whitespace_tokens: Vec::new(),
            start: 0,
            end: 0,
            error: 0,
        };
        grammar.start = grammar
            .intern_symbol(".start", 0, LexemeType::Null, SymbolType::NonTerminal)
            .expect("fresh symbol table");
        grammar.end = grammar
            .intern_symbol(".end", 0, LexemeType::Null, SymbolType::End)
            .expect("fresh symbol table");
        grammar.error = grammar
            .intern_symbol(".error", 0, LexemeType::Null, SymbolType::Null)
            .expect("fresh symbol table");
        grammar
    }

    /// Build a grammar from grammar source text.
    pub fn parse(source: &str) -> Result<Self, LalrkitError> {
        parser::parse_grammar(source)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, index: SymbolIndex) -> &Symbol {
        &self.symbols[index]
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    pub fn production(&self, index: ProductionIndex) -> &Production {
        &self.productions[index]
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn whitespace_tokens(&self) -> &[LexerToken] {
        &self.whitespace_tokens
    }

    /// The augmented start symbol `.start`.
    pub fn start_symbol(&self) -> SymbolIndex {
        self.start
    }

    /// The end-of-input symbol `.end`.
    pub fn end_symbol(&self) -> SymbolIndex {
        self.end
    }

    /// The error-recovery symbol `.error`.
    pub fn error_symbol(&self) -> SymbolIndex {
        self.error
    }

    /// Open a precedence directive. Symbols appended to the scope join the
    /// group; the group's number (1-based textual order) becomes their
    /// precedence during generation.
    pub fn open_directive(&mut self, associativity: Associativity) -> DirectiveScope<'_> {
        self.directives.push(Directive::new(associativity));
        let directive = self.directives.len() - 1;
        DirectiveScope {
            grammar: self,
            directive,
        }
    }

    /// Open the whitespace block. Patterns appended to the scope are
    /// compiled into the whitespace machine and never surface as tokens.
    pub fn open_whitespace(&mut self) -> WhitespaceScope<'_> {
        WhitespaceScope { grammar: self }
    }

    /// Open the rules of the nonterminal `identifier`.
    pub fn open_production(
        &mut self,
        identifier: &str,
        line: usize,
    ) -> Result<ProductionScope<'_>, LalrkitError> {
        let symbol = self.non_terminal_symbol(identifier, line)?;
        Ok(ProductionScope {
            grammar: self,
            symbol,
            line,
            current: None,
            pending_precedence: false,
        })
    }

    pub(crate) fn literal_symbol(
        &mut self,
        lexeme: &str,
        line: usize,
    ) -> Result<SymbolIndex, LalrkitError> {
        self.intern_symbol(lexeme, line, LexemeType::Literal, SymbolType::Null)
    }

    pub(crate) fn regex_symbol(
        &mut self,
        lexeme: &str,
        line: usize,
    ) -> Result<SymbolIndex, LalrkitError> {
        self.intern_symbol(lexeme, line, LexemeType::Regex, SymbolType::Null)
    }

    pub(crate) fn non_terminal_symbol(
        &mut self,
        lexeme: &str,
        line: usize,
    ) -> Result<SymbolIndex, LalrkitError> {
        self.intern_symbol(lexeme, line, LexemeType::Null, SymbolType::NonTerminal)
    }

    /// Intern a symbol by lexeme.
    ///
    /// Re-declaring a symbol returns the existing one. The first non-Null
    /// classification wins; a later *conflicting* non-Null classification
    /// is a syntax error, while Null→non-Null upgrades are allowed.
    pub(crate) fn intern_symbol(
        &mut self,
        lexeme: &str,
        line: usize,
        lexeme_type: LexemeType,
        symbol_type: SymbolType,
    ) -> Result<SymbolIndex, LalrkitError> {
        if let Some(&index) = self.by_lexeme.get(lexeme) {
            let existing = &mut self.symbols[index];
            match (existing.lexeme_type, lexeme_type) {
                (_, LexemeType::Null) => {}
                (LexemeType::Null, new) => existing.lexeme_type = new,
                (old, new) if old != new => {
                    return Err(LalrkitError::Syntax {
                        line,
                        message: format!("`{}` redeclared with a conflicting lexeme kind", lexeme)
                            .into(),
                    });
                }
                _ => {}
            }
            match (existing.symbol_type, symbol_type) {
                (_, SymbolType::Null) => {}
                (SymbolType::Null, new) => existing.symbol_type = new,
                (old, new) if old != new => {
                    return Err(LalrkitError::Syntax {
                        line,
                        message: format!("`{}` redeclared with a conflicting symbol kind", lexeme)
                            .into(),
                    });
                }
                _ => {}
            }
            return Ok(index);
        }
        let index = self.symbols.len();
        self.symbols
            .push(Symbol::new(index, lexeme, line, lexeme_type, symbol_type));
        self.by_lexeme.insert(String::from(lexeme), index);
        Ok(index)
    }

    /// Intern a semantic action by identifier, in declaration order.
    pub(crate) fn add_action(&mut self, identifier: &str) -> ActionIndex {
        if let Some(&index) = self.actions_by_identifier.get(identifier) {
            return index;
        }
        let index = self.actions.len();
        self.actions.push(Action {
            index,
            identifier: String::from(identifier),
        });
        self.actions_by_identifier
            .insert(String::from(identifier), index);
        index
    }

    pub(crate) fn add_production(
        &mut self,
        symbol: SymbolIndex,
        line: usize,
    ) -> ProductionIndex {
        let index = self.productions.len();
        self.productions.push(Production::new(index, symbol, line));
        self.symbols[symbol].productions.push(index);
        index
    }

    /// Insert a production at the front (the augmented start production)
    /// and renumber everything that refers to productions by index.
    pub(crate) fn prepend_production(&mut self, symbol: SymbolIndex) -> ProductionIndex {
        self.productions.insert(0, Production::new(0, symbol, 0));
        for (index, production) in self.productions.iter_mut().enumerate() {
            production.index = index;
        }
        self.rebuild_symbol_productions();
        0
    }

    /// Drop the productions that `keep` rejects and renumber the rest.
    pub(crate) fn retain_productions(&mut self, keep: impl Fn(&Production) -> bool) {
        self.productions.retain(|p| keep(p));
        for (index, production) in self.productions.iter_mut().enumerate() {
            production.index = index;
        }
        self.rebuild_symbol_productions();
    }

    fn rebuild_symbol_productions(&mut self) {
        for symbol in &mut self.symbols {
            symbol.productions.clear();
        }
        for index in 0..self.productions.len() {
            let lhs = self.productions[index].symbol;
            self.symbols[lhs].productions.push(index);
        }
    }

    /// Renumber symbols according to `order` (a permutation of the current
    /// indices, possibly omitting dropped symbols) and rewrite every
    /// cross-reference.
    pub(crate) fn renumber_symbols(&mut self, order: &[SymbolIndex]) {
        let mut remap = vec![usize::MAX; self.symbols.len()];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }
        let mut symbols = Vec::with_capacity(order.len());
        for &old in order {
            let mut symbol = self.symbols[old].clone();
            symbol.index = symbols.len();
            symbols.push(symbol);
        }
        self.symbols = symbols;
        self.by_lexeme = self
            .symbols
            .iter()
            .map(|s| (s.lexeme.clone(), s.index))
            .collect();
        for production in &mut self.productions {
            production.symbol = remap[production.symbol];
            for symbol in &mut production.right {
                *symbol = remap[*symbol];
            }
            if let Some(p) = production.precedence_symbol {
                production.precedence_symbol = Some(remap[p]);
            }
        }
        for directive in &mut self.directives {
            for symbol in &mut directive.symbols {
                *symbol = remap[*symbol];
            }
        }
        for token in &mut self.whitespace_tokens {
            if let Some(s) = token.symbol {
                token.symbol = Some(remap[s]);
            }
        }
        self.start = remap[self.start];
        self.end = remap[self.end];
        self.error = remap[self.error];
    }
}

/// Scope appending symbols to one precedence directive.
pub struct DirectiveScope<'g> {
    grammar: &'g mut Grammar,
    directive: usize,
}

impl<'g> DirectiveScope<'g> {
    pub fn literal(self, lexeme: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.literal_symbol(lexeme, line)?;
        self.append(index)
    }

    pub fn regex(self, pattern: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.regex_symbol(pattern, line)?;
        self.append(index)
    }

    pub fn identifier(self, name: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.non_terminal_symbol(name, line)?;
        self.append(index)
    }

    fn append(self, index: SymbolIndex) -> Result<Self, LalrkitError> {
        self.grammar.directives[self.directive].symbols.push(index);
        Ok(self)
    }
}

/// Scope appending patterns to the whitespace token list.
pub struct WhitespaceScope<'g> {
    grammar: &'g mut Grammar,
}

impl<'g> WhitespaceScope<'g> {
    pub fn literal(self, pattern: &str, line: usize) -> Self {
        self.push(LexerTokenKind::Literal, pattern, line)
    }

    pub fn regex(self, pattern: &str, line: usize) -> Self {
        self.push(LexerTokenKind::Regex, pattern, line)
    }

    fn push(self, kind: LexerTokenKind, pattern: &str, line: usize) -> Self {
        self.grammar.whitespace_tokens.push(LexerToken {
            kind,
            line,
            symbol: None,
            pattern: String::from(pattern),
        });
        self
    }
}

/// Scope appending alternatives to one nonterminal's rules.
///
/// An alternative is closed by [`action`](Self::action) or
/// [`end_expression`](Self::end_expression); closing an alternative that
/// never received a symbol registers an ε-production.
pub struct ProductionScope<'g> {
    grammar: &'g mut Grammar,
    symbol: SymbolIndex,
    line: usize,
    current: Option<ProductionIndex>,
    pending_precedence: bool,
}

impl<'g> ProductionScope<'g> {
    fn ensure_production(&mut self) -> ProductionIndex {
        match self.current {
            Some(p) => p,
            None => {
                let p = self.grammar.add_production(self.symbol, self.line);
                self.current = Some(p);
                p
            }
        }
    }

    fn append(mut self, index: SymbolIndex) -> Self {
        let production = self.ensure_production();
        if self.pending_precedence {
            self.grammar.productions[production].precedence_symbol = Some(index);
            self.pending_precedence = false;
        } else {
            self.grammar.productions[production].right.push(index);
        }
        self
    }

    /// Append a literal terminal to the open alternative.
    pub fn literal(self, lexeme: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.literal_symbol(lexeme, line)?;
        Ok(self.append(index))
    }

    /// Append a regular-expression terminal to the open alternative.
    pub fn regex(self, pattern: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.regex_symbol(pattern, line)?;
        Ok(self.append(index))
    }

    /// Append a named symbol to the open alternative.
    pub fn identifier(self, name: &str, line: usize) -> Result<Self, LalrkitError> {
        let index = self.grammar.non_terminal_symbol(name, line)?;
        Ok(self.append(index))
    }

    /// Append the error-recovery symbol.
    pub fn error(mut self) -> Self {
        let index = self.grammar.error_symbol();
        self = self.append(index);
        self
    }

    /// The next appended symbol donates its precedence to this alternative
    /// instead of joining its right-hand side.
    pub fn precedence(mut self) -> Self {
        self.pending_precedence = true;
        self
    }

    /// Attach the reduce action `identifier` and close the alternative.
    pub fn action(mut self, identifier: &str) -> Self {
        let production = self.ensure_production();
        let action = self.grammar.add_action(identifier);
        self.grammar.productions[production].action = Some(action);
        self.current = None;
        self
    }

    /// Close the alternative; if it never received a symbol this registers
    /// an ε-production.
    pub fn end_expression(mut self) -> Self {
        self.ensure_production();
        self.current = None;
        self
    }
}

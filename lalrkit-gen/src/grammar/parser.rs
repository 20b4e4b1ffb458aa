//! Parser for grammar source files.
//!
//! The token stream from [`lexer`](super::lexer) is parsed into a small
//! AST, which is then folded into a [`Grammar`](super::Grammar) through the
//! scoped builders. Keeping the chumsky parser free of side effects keeps
//! it testable at the token level.

use super::lexer::{tokenize, DslToken, SpannedToken};
use super::symbol::Associativity;
use super::Grammar;
use chumsky::prelude::*;
use lalrkit::LalrkitError;
use smartstring::alias::String;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RhsItem {
    Identifier(String, usize),
    Literal(String, usize),
    Regex(String, usize),
    Error(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Alternative {
    pub items: Vec<RhsItem>,
    pub precedence: Option<RhsItem>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    Directive {
        associativity: Associativity,
        symbols: Vec<RhsItem>,
    },
    Whitespace {
        tokens: Vec<RhsItem>,
    },
    Production {
        name: String,
        line: usize,
        alternatives: Vec<Alternative>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GrammarAst {
    pub identifier: String,
    pub statements: Vec<Statement>,
}

pub(crate) fn parser<'a>(
) -> impl Parser<'a, &'a [SpannedToken], GrammarAst, extra::Err<Rich<'a, SpannedToken>>> {
    let symbol = select! {
        SpannedToken { token: DslToken::Identifier(name), line } => RhsItem::Identifier(name, line),
        SpannedToken { token: DslToken::Literal(text), line } => RhsItem::Literal(text, line),
        SpannedToken { token: DslToken::Regex(text), line } => RhsItem::Regex(text, line),
        SpannedToken { token: DslToken::ErrorKw, line } => RhsItem::Error(line),
    }
    .labelled("symbol");

    let colon = select! { SpannedToken { token: DslToken::Colon, .. } => () };
    let pipe = select! { SpannedToken { token: DslToken::Pipe, .. } => () };
    let semi = select! { SpannedToken { token: DslToken::Semi, .. } => () }.labelled("`;`");
    let lbracket = select! { SpannedToken { token: DslToken::LeftBracket, .. } => () };
    let rbracket = select! { SpannedToken { token: DslToken::RightBracket, .. } => () };
    let precedence_kw = select! { SpannedToken { token: DslToken::Precedence, .. } => () };
    let name = select! {
        SpannedToken { token: DslToken::Identifier(name), line } => (name, line),
    }
    .labelled("identifier");

    let associativity = select! {
        SpannedToken { token: DslToken::Left, .. } => Associativity::Left,
        SpannedToken { token: DslToken::Right, .. } => Associativity::Right,
        SpannedToken { token: DslToken::NonePrec, .. } => Associativity::None,
        SpannedToken { token: DslToken::Nonassoc, .. } => Associativity::Nonassoc,
    };

    let directive = associativity
        .then(symbol.clone().repeated().collect::<Vec<_>>())
        .then_ignore(semi.clone())
        .map(|(associativity, symbols)| Statement::Directive {
            associativity,
            symbols,
        });

    let whitespace = select! { SpannedToken { token: DslToken::Whitespace, .. } => () }
        .ignore_then(symbol.clone().repeated().collect::<Vec<_>>())
        .then_ignore(semi.clone())
        .map(|tokens| Statement::Whitespace { tokens });

    let action = lbracket
        .ignore_then(name.clone().map(|(name, _)| name))
        .then_ignore(rbracket)
        .labelled("action");

    let alternative = symbol
        .clone()
        .repeated()
        .collect::<Vec<_>>()
        .then(precedence_kw.ignore_then(symbol).or_not())
        .then(action.or_not())
        .map(|((items, precedence), action)| Alternative {
            items,
            precedence,
            action,
        });

    let production = name
        .clone()
        .then_ignore(colon)
        .then(alternative.separated_by(pipe).collect::<Vec<_>>())
        .then_ignore(semi.clone())
        .map(|((name, line), alternatives)| Statement::Production {
            name,
            line,
            alternatives,
        });

    let statement = directive.or(whitespace).or(production);

    name.then_ignore(semi)
        .then(statement.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|((identifier, _), statements)| GrammarAst {
            identifier,
            statements,
        })
}

/// Parse grammar source into a [`Grammar`].
pub(crate) fn parse_grammar(source: &str) -> Result<Grammar, LalrkitError> {
    let tokens = tokenize(source)?;
    let ast = parser()
        .parse(tokens.as_slice())
        .into_result()
        .map_err(|errors| {
            let first = errors.into_iter().next();
            let (line, message) = match first {
                Some(err) => {
                    let index = err.span().start;
                    let line = tokens
                        .get(index.min(tokens.len().saturating_sub(1)))
                        .map_or(0, |t| t.line);
                    (line, err.to_string())
                }
                None => (0, "malformed grammar".to_owned()),
            };
            LalrkitError::Syntax {
                line,
                message: message.into(),
            }
        })?;
    build_grammar(ast)
}

fn build_grammar(ast: GrammarAst) -> Result<Grammar, LalrkitError> {
    let mut grammar = Grammar::new(&ast.identifier);
    for statement in ast.statements {
        match statement {
            Statement::Directive {
                associativity,
                symbols,
            } => {
                let mut scope = grammar.open_directive(associativity);
                for item in symbols {
                    scope = match item {
                        RhsItem::Identifier(name, line) => scope.identifier(&name, line)?,
                        RhsItem::Literal(text, line) => scope.literal(&text, line)?,
                        RhsItem::Regex(text, line) => scope.regex(&text, line)?,
                        RhsItem::Error(line) => {
                            return Err(LalrkitError::Syntax {
                                line,
                                message: "`error` cannot appear in a precedence directive".into(),
                            });
                        }
                    };
                }
            }
            Statement::Whitespace { tokens } => {
                let mut scope = grammar.open_whitespace();
                for item in tokens {
                    scope = match item {
                        RhsItem::Literal(text, line) => scope.literal(&text, line),
                        RhsItem::Regex(text, line) => scope.regex(&text, line),
                        RhsItem::Identifier(_, line) | RhsItem::Error(line) => {
                            return Err(LalrkitError::Syntax {
                                line,
                                message: "%whitespace accepts only literals and regexes".into(),
                            });
                        }
                    };
                }
            }
            Statement::Production {
                name,
                line,
                alternatives,
            } => {
                let mut scope = grammar.open_production(&name, line)?;
                for alternative in alternatives {
                    for item in alternative.items {
                        scope = match item {
                            RhsItem::Identifier(name, line) => scope.identifier(&name, line)?,
                            RhsItem::Literal(text, line) => scope.literal(&text, line)?,
                            RhsItem::Regex(text, line) => scope.regex(&text, line)?,
                            RhsItem::Error(_) => scope.error(),
                        };
                    }
                    if let Some(item) = alternative.precedence {
                        scope = scope.precedence();
                        scope = match item {
                            RhsItem::Identifier(name, line) => scope.identifier(&name, line)?,
                            RhsItem::Literal(text, line) => scope.literal(&text, line)?,
                            RhsItem::Regex(text, line) => scope.regex(&text, line)?,
                            RhsItem::Error(line) => {
                                return Err(LalrkitError::Syntax {
                                    line,
                                    message: "`error` cannot donate precedence".into(),
                                });
                            }
                        };
                    }
                    scope = match alternative.action {
                        Some(action) => scope.action(&action),
                        None => scope.end_expression(),
                    };
                }
            }
        }
    }
    Ok(grammar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{LexemeType, SymbolType};

    fn parse_ast(source: &str) -> GrammarAst {
        let tokens = tokenize(source).unwrap();
        let ast = parser().parse(tokens.as_slice()).into_result().unwrap();
        ast
    }

    #[test]
    fn parses_header_and_directives() {
        let ast = parse_ast("calc; %left '+' '-'; %right '^';");
        assert_eq!(&*ast.identifier, "calc");
        assert_eq!(ast.statements.len(), 2);
        assert!(matches!(
            &ast.statements[0],
            Statement::Directive {
                associativity: Associativity::Left,
                symbols
            } if symbols.len() == 2
        ));
    }

    #[test]
    fn parses_alternatives_with_actions() {
        let ast = parse_ast("g; E : E '+' T [add] | T;");
        let Statement::Production { alternatives, .. } = &ast.statements[0] else {
            panic!("expected production");
        };
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].items.len(), 3);
        assert_eq!(alternatives[0].action.as_deref(), Some("add"));
        assert!(alternatives[1].action.is_none());
    }

    #[test]
    fn parses_empty_alternative() {
        let ast = parse_ast("g; S : 'a' S 'b' | ;");
        let Statement::Production { alternatives, .. } = &ast.statements[0] else {
            panic!("expected production");
        };
        assert_eq!(alternatives.len(), 2);
        assert!(alternatives[1].items.is_empty());
    }

    #[test]
    fn parses_precedence_override() {
        let ast = parse_ast("g; E : '-' E %precedence '*' [neg];");
        let Statement::Production { alternatives, .. } = &ast.statements[0] else {
            panic!("expected production");
        };
        assert_eq!(
            alternatives[0].precedence,
            Some(RhsItem::Literal("*".into(), 1))
        );
        assert_eq!(alternatives[0].action.as_deref(), Some("neg"));
    }

    #[test]
    fn builds_grammar_from_source() {
        let grammar = Grammar::parse(
            "calc;\n\
             %left '+';\n\
             %whitespace \"[ ]+\";\n\
             E : E '+' E [add] | 'n';\n",
        )
        .unwrap();
        assert_eq!(grammar.identifier(), "calc");
        assert_eq!(grammar.directives().len(), 1);
        assert_eq!(grammar.whitespace_tokens().len(), 1);
        assert_eq!(grammar.productions().len(), 2);
        let plus = grammar
            .symbols()
            .iter()
            .find(|s| &*s.lexeme == "+")
            .unwrap();
        assert_eq!(plus.lexeme_type, LexemeType::Literal);
        let e = grammar
            .symbols()
            .iter()
            .find(|s| &*s.lexeme == "E")
            .unwrap();
        assert_eq!(e.symbol_type, SymbolType::NonTerminal);
        assert_eq!(e.productions.len(), 2);
    }

    #[test]
    fn error_symbol_lands_in_the_rhs() {
        let grammar = Grammar::parse("g; stmt : expr ';' | error ';'; expr : 'n';").unwrap();
        let recovery = grammar.production(1);
        assert_eq!(recovery.right[0], grammar.error_symbol());
    }

    #[test]
    fn reports_line_of_first_parse_error() {
        let err = Grammar::parse("g;\nE : 'a'\nF : 'b';").unwrap_err();
        match err {
            LalrkitError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_header_is_rejected() {
        assert!(Grammar::parse("%left '+';").is_err());
    }
}

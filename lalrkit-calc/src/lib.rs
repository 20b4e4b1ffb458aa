//! An arithmetic calculator built on the lalrkit toolkit.
//!
//! The grammar below is compiled into state machines when a
//! [`Calculator`] is created; evaluation then runs the table-driven parser
//! with reduce handlers that fold `i64` values. Precedence comes from the
//! `%left` groups: `*` and `/` bind tighter than `+` and `-`, and every
//! operator is left-associative.

mod error;

pub use error::CalcError;

use anyhow::Context;
use lalrkit::{CollectSink, LalrkitError, Parser};
use lalrkit_gen::CompiledGrammar;

/// The calculator grammar.
pub const GRAMMAR: &str = "calculator;
    %left '+' '-';
    %left '*' '/';
    %whitespace \"[ \\t\\r\\n]*\";
    expr : expr '+' expr [add]
         | expr '-' expr [subtract]
         | expr '*' expr [multiply]
         | expr '/' expr [divide]
         | '(' expr ')' [compound]
         | integer [integer];
    integer : \"[0-9]+\";";

/// A compiled calculator, reusable for any number of evaluations.
pub struct Calculator {
    machines: CompiledGrammar,
}

impl Calculator {
    /// Compile the calculator grammar.
    ///
    /// The grammar's shift/reduce ties are resolved by associativity, so
    /// conflict reports are expected; only structural failures propagate.
    pub fn new() -> anyhow::Result<Self> {
        let mut sink = CollectSink::new();
        let machines =
            lalrkit_gen::compile(GRAMMAR, &mut sink).context("calculator grammar is invalid")?;
        log::debug!(
            "calculator grammar compiled with {} resolved conflicts",
            sink.entries.len()
        );
        Ok(Self { machines })
    }

    /// Evaluate one arithmetic expression.
    pub fn evaluate(&self, input: &str) -> Result<i64, CalcError> {
        let mut sink = CollectSink::new();
        let mut parser: Parser<'_, _, i64> = Parser::new(
            &self.machines.parser,
            &self.machines.lexer,
            &self.machines.whitespace,
            input.chars().fuse(),
        );

        parser.set_reduce_handler(
            "add",
            Box::new(|nodes| Ok(nodes[0].value + nodes[2].value)),
        );
        parser.set_reduce_handler(
            "subtract",
            Box::new(|nodes| Ok(nodes[0].value - nodes[2].value)),
        );
        parser.set_reduce_handler(
            "multiply",
            Box::new(|nodes| Ok(nodes[0].value * nodes[2].value)),
        );
        parser.set_reduce_handler(
            "divide",
            Box::new(|nodes| {
                if nodes[2].value == 0 {
                    return Err(LalrkitError::ActionFailed {
                        line: nodes[1].line,
                        identifier: "divide".into(),
                        message: "division by zero".into(),
                    });
                }
                Ok(nodes[0].value / nodes[2].value)
            }),
        );
        parser.set_reduce_handler("compound", Box::new(|nodes| Ok(nodes[1].value)));
        parser.set_reduce_handler(
            "integer",
            Box::new(|nodes| {
                nodes[0]
                    .lexeme
                    .parse::<i64>()
                    .map_err(|e| LalrkitError::ActionFailed {
                        line: nodes[0].line,
                        identifier: "integer".into(),
                        message: e.to_string().into(),
                    })
            }),
        );

        let accepted = parser.parse(&mut sink)?;
        if !accepted {
            let message = sink
                .entries
                .first()
                .map_or_else(|| "syntax error".to_owned(), |(_, _, m)| m.clone());
            return Err(CalcError::Rejected {
                message: message.into(),
            });
        }
        parser.into_value().ok_or(CalcError::Rejected {
            message: "empty input".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn evaluates_the_classic_example() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate("1 + 2 * (3 + 4) + 5").unwrap(), 20);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate("2 + 3 * 4").unwrap(), 14);
        assert_eq!(calc.evaluate("(2 + 3) * 4").unwrap(), 20);
    }

    #[test]
    fn operators_are_left_associative() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate("7 - 4 - 2").unwrap(), 1);
        assert_eq!(calc.evaluate("100 / 10 / 5").unwrap(), 2);
    }

    #[test]
    fn whitespace_is_insignificant() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate("\t1+\n2 ").unwrap(), 3);
        assert_eq!(calc.evaluate("1+2").unwrap(), 3);
    }

    #[test]
    fn division_by_zero_is_an_action_failure() {
        init_logger();
        let calc = Calculator::new().unwrap();
        let err = calc.evaluate("1 / 0").unwrap_err();
        assert!(matches!(
            err,
            CalcError::Parse(LalrkitError::ActionFailed { .. })
        ));
    }

    #[test]
    fn malformed_input_is_rejected() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert!(matches!(
            calc.evaluate("1 + + 2"),
            Err(CalcError::Rejected { .. })
        ));
        assert!(matches!(
            calc.evaluate("(1 + 2"),
            Err(CalcError::Rejected { .. })
        ));
    }

    #[test]
    fn a_single_number_is_an_expression() {
        init_logger();
        let calc = Calculator::new().unwrap();
        assert_eq!(calc.evaluate("42").unwrap(), 42);
    }
}

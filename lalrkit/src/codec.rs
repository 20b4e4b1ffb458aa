//! Serialization of generated state machines.
//!
//! The layout is fixed for a given [`FORMAT_VERSION`]: a magic/version/kind
//! header, then little-endian arrays in a fixed order. Strings are
//! `u32` length-prefixed UTF-8. Optional indices use [`NONE`] as a sentinel.
//!
//! Decoding validates every cross-reference, so a decoded machine upholds
//! the same invariants as a freshly generated one.

use crate::machine::{
    LexerState, LexerStateMachine, LexerTransition, MachineAction, MachineSymbol,
    ParserActionKind, ParserReduction, ParserState, ParserStateMachine, ParserTransition,
    SymbolKind,
};
use smartstring::alias::String;
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"LALR";
pub const FORMAT_VERSION: u32 = 1;

const KIND_PARSER: u8 = 1;
const KIND_LEXER: u8 = 2;

/// Sentinel for an absent optional index.
const NONE: u32 = u32::MAX;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated table data at byte {0}")]
    Truncated(usize),
    #[error("bad magic number")]
    BadMagic,
    #[error("unsupported table format version {0}")]
    BadVersion(u32),
    #[error("unexpected section kind {found}, wanted {wanted}")]
    BadKind { wanted: u8, found: u8 },
    #[error("invalid discriminant {0}")]
    BadDiscriminant(u8),
    #[error("table data is not valid UTF-8")]
    BadUtf8,
    #[error("index {index} out of bounds for array of {len}")]
    BadIndex { index: usize, len: usize },
    #[error("trailing bytes after table data")]
    TrailingBytes,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(CodecError::Truncated(self.pos))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn index(&mut self, len: usize) -> Result<usize, CodecError> {
        let index = self.u32()? as usize;
        if index >= len {
            return Err(CodecError::BadIndex { index, len });
        }
        Ok(index)
    }

    fn opt_index(&mut self, len: usize) -> Result<Option<usize>, CodecError> {
        let raw = self.u32()?;
        if raw == NONE {
            return Ok(None);
        }
        let index = raw as usize;
        if index >= len {
            return Err(CodecError::BadIndex { index, len });
        }
        Ok(Some(index))
    }

    fn str(&mut self) -> Result<String, CodecError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::BadUtf8)?;
        Ok(String::from(s))
    }

    fn finish(&self) -> Result<(), CodecError> {
        if self.pos != self.bytes.len() {
            return Err(CodecError::TrailingBytes);
        }
        Ok(())
    }

    fn header(&mut self, kind: u8) -> Result<(), CodecError> {
        if self.take(4)? != MAGIC {
            return Err(CodecError::BadMagic);
        }
        let version = self.u32()?;
        if version != FORMAT_VERSION {
            return Err(CodecError::BadVersion(version));
        }
        let found = self.u8()?;
        if found != kind {
            return Err(CodecError::BadKind {
                wanted: kind,
                found,
            });
        }
        Ok(())
    }
}

fn put_u32(out: &mut Vec<u8>, v: usize) {
    debug_assert!(v <= u32::MAX as usize);
    out.extend_from_slice(&(v as u32).to_le_bytes());
}

fn put_opt(out: &mut Vec<u8>, v: Option<usize>) {
    match v {
        Some(v) => put_u32(out, v),
        None => out.extend_from_slice(&NONE.to_le_bytes()),
    }
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len());
    out.extend_from_slice(s.as_bytes());
}

fn put_header(out: &mut Vec<u8>, kind: u8) {
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(kind);
}

/// Serialize a parser machine.
pub fn encode_parser_machine(machine: &ParserStateMachine) -> Vec<u8> {
    let mut out = Vec::new();
    put_header(&mut out, KIND_PARSER);
    put_str(&mut out, &machine.identifier);

    let total_transitions: usize = machine.states.iter().map(|s| s.transitions.len()).sum();
    put_u32(&mut out, machine.symbols.len());
    put_u32(&mut out, machine.actions.len());
    put_u32(&mut out, machine.states.len());
    put_u32(&mut out, total_transitions);
    put_u32(&mut out, machine.reductions.len());
    put_u32(&mut out, machine.start_state);
    put_u32(&mut out, machine.start_symbol);
    put_u32(&mut out, machine.end_symbol);
    put_u32(&mut out, machine.error_symbol);

    for symbol in &machine.symbols {
        out.push(symbol.kind.into());
        put_str(&mut out, &symbol.identifier);
        put_str(&mut out, &symbol.lexeme);
    }
    for action in &machine.actions {
        put_str(&mut out, &action.identifier);
    }

    let mut offset = 0usize;
    for state in &machine.states {
        put_u32(&mut out, offset);
        put_u32(&mut out, state.transitions.len());
        offset += state.transitions.len();
    }
    for state in &machine.states {
        for t in &state.transitions {
            put_u32(&mut out, t.symbol);
            out.push(t.kind.into());
            put_u32(&mut out, t.value);
        }
    }
    for r in &machine.reductions {
        put_u32(&mut out, r.production);
        put_u32(&mut out, r.symbol);
        put_u32(&mut out, r.length);
        put_opt(&mut out, r.action);
    }
    out
}

/// Deserialize a parser machine, validating every cross-reference.
pub fn decode_parser_machine(bytes: &[u8]) -> Result<ParserStateMachine, CodecError> {
    let mut r = Reader::new(bytes);
    let machine = read_parser_machine(&mut r)?;
    r.finish()?;
    Ok(machine)
}

fn read_parser_machine(r: &mut Reader<'_>) -> Result<ParserStateMachine, CodecError> {
    r.header(KIND_PARSER)?;
    let identifier = r.str()?;

    let n_symbols = r.u32()? as usize;
    let n_actions = r.u32()? as usize;
    let n_states = r.u32()? as usize;
    let n_transitions = r.u32()? as usize;
    let n_reductions = r.u32()? as usize;
    let start_state = r.index(n_states.max(1))?;
    let start_symbol = r.index(n_symbols.max(1))?;
    let end_symbol = r.index(n_symbols.max(1))?;
    let error_symbol = r.index(n_symbols.max(1))?;

    let mut symbols = Vec::with_capacity(n_symbols);
    for index in 0..n_symbols {
        let kind =
            SymbolKind::try_from(r.u8()?).map_err(|e| CodecError::BadDiscriminant(e.number))?;
        let identifier = r.str()?;
        let lexeme = r.str()?;
        symbols.push(MachineSymbol {
            index,
            identifier,
            lexeme,
            kind,
        });
    }
    let mut actions = Vec::with_capacity(n_actions);
    for index in 0..n_actions {
        actions.push(MachineAction {
            index,
            identifier: r.str()?,
        });
    }

    let mut counts = Vec::with_capacity(n_states);
    let mut expected_offset = 0usize;
    for _ in 0..n_states {
        let offset = r.u32()? as usize;
        let count = r.u32()? as usize;
        if offset != expected_offset {
            return Err(CodecError::BadIndex {
                index: offset,
                len: n_transitions,
            });
        }
        expected_offset += count;
        counts.push(count);
    }
    if expected_offset != n_transitions {
        return Err(CodecError::BadIndex {
            index: expected_offset,
            len: n_transitions,
        });
    }

    let mut states = Vec::with_capacity(n_states);
    for (index, count) in counts.into_iter().enumerate() {
        let mut transitions = Vec::with_capacity(count);
        for _ in 0..count {
            let symbol = r.index(n_symbols)?;
            let kind = ParserActionKind::try_from(r.u8()?)
                .map_err(|e| CodecError::BadDiscriminant(e.number))?;
            let value = match kind {
                ParserActionKind::Shift | ParserActionKind::Goto => r.index(n_states)?,
                ParserActionKind::Reduce => r.index(n_reductions)?,
                ParserActionKind::Accept | ParserActionKind::Error => r.u32()? as usize,
            };
            transitions.push(ParserTransition {
                symbol,
                kind,
                value,
            });
        }
        states.push(ParserState { index, transitions });
    }

    let mut reductions = Vec::with_capacity(n_reductions);
    for _ in 0..n_reductions {
        let production = r.u32()? as usize;
        let symbol = r.index(n_symbols)?;
        let length = r.u32()? as usize;
        let action = r.opt_index(n_actions.max(1))?;
        reductions.push(ParserReduction {
            production,
            symbol,
            length,
            action,
        });
    }

    Ok(ParserStateMachine {
        identifier,
        symbols,
        actions,
        states,
        reductions,
        start_state,
        start_symbol,
        end_symbol,
        error_symbol,
    })
}

/// Serialize a scanner machine.
pub fn encode_lexer_machine(machine: &LexerStateMachine) -> Vec<u8> {
    let mut out = Vec::new();
    put_header(&mut out, KIND_LEXER);

    let total_transitions: usize = machine.states.iter().map(|s| s.transitions.len()).sum();
    put_u32(&mut out, machine.actions.len());
    put_u32(&mut out, machine.states.len());
    put_u32(&mut out, total_transitions);
    put_u32(&mut out, machine.start_state);

    for action in &machine.actions {
        put_str(&mut out, &action.identifier);
    }
    let mut offset = 0usize;
    for state in &machine.states {
        put_u32(&mut out, offset);
        put_u32(&mut out, state.transitions.len());
        out.push(state.accepting as u8);
        put_opt(&mut out, state.accept);
        put_opt(&mut out, state.action);
        offset += state.transitions.len();
    }
    for state in &machine.states {
        for t in &state.transitions {
            put_u32(&mut out, t.begin as usize);
            put_u32(&mut out, t.end as usize);
            put_u32(&mut out, t.target);
        }
    }
    out
}

/// Deserialize a scanner machine.
pub fn decode_lexer_machine(bytes: &[u8]) -> Result<LexerStateMachine, CodecError> {
    let mut r = Reader::new(bytes);
    let machine = read_lexer_machine(&mut r)?;
    r.finish()?;
    Ok(machine)
}

fn read_lexer_machine(r: &mut Reader<'_>) -> Result<LexerStateMachine, CodecError> {
    r.header(KIND_LEXER)?;

    let n_actions = r.u32()? as usize;
    let n_states = r.u32()? as usize;
    let n_transitions = r.u32()? as usize;
    let start_state = r.index(n_states.max(1))?;

    let mut actions = Vec::with_capacity(n_actions);
    for index in 0..n_actions {
        actions.push(MachineAction {
            index,
            identifier: r.str()?,
        });
    }

    let mut heads = Vec::with_capacity(n_states);
    let mut expected_offset = 0usize;
    for _ in 0..n_states {
        let offset = r.u32()? as usize;
        let count = r.u32()? as usize;
        if offset != expected_offset {
            return Err(CodecError::BadIndex {
                index: offset,
                len: n_transitions,
            });
        }
        expected_offset += count;
        let flags = r.u8()?;
        if flags > 1 {
            return Err(CodecError::BadDiscriminant(flags));
        }
        let accept = r.opt_index(usize::MAX)?;
        let action = r.opt_index(n_actions.max(1))?;
        heads.push((count, flags == 1, accept, action));
    }
    if expected_offset != n_transitions {
        return Err(CodecError::BadIndex {
            index: expected_offset,
            len: n_transitions,
        });
    }

    let mut states = Vec::with_capacity(n_states);
    for (index, (count, accepting, accept, action)) in heads.into_iter().enumerate() {
        let mut transitions = Vec::with_capacity(count);
        for _ in 0..count {
            let begin = r.u32()?;
            let end = r.u32()?;
            let target = r.index(n_states)?;
            transitions.push(LexerTransition { begin, end, target });
        }
        states.push(LexerState {
            index,
            transitions,
            accepting,
            accept,
            action,
        });
    }

    Ok(LexerStateMachine {
        actions,
        states,
        start_state,
    })
}

/// Serialize a parser machine with its two scanner machines as one blob.
pub fn encode_state_machines(
    parser: &ParserStateMachine,
    lexer: &LexerStateMachine,
    whitespace: &LexerStateMachine,
) -> Vec<u8> {
    let mut out = Vec::new();
    for section in [
        encode_parser_machine(parser),
        encode_lexer_machine(lexer),
        encode_lexer_machine(whitespace),
    ] {
        put_u32(&mut out, section.len());
        out.extend_from_slice(&section);
    }
    out
}

/// Deserialize a blob produced by [`encode_state_machines`].
pub fn decode_state_machines(
    bytes: &[u8],
) -> Result<(ParserStateMachine, LexerStateMachine, LexerStateMachine), CodecError> {
    let mut r = Reader::new(bytes);
    let parser = {
        let len = r.u32()? as usize;
        decode_parser_machine(r.take(len)?)?
    };
    let lexer = {
        let len = r.u32()? as usize;
        decode_lexer_machine(r.take(len)?)?
    };
    let whitespace = {
        let len = r.u32()? as usize;
        decode_lexer_machine(r.take(len)?)?
    };
    r.finish()?;
    Ok((parser, lexer, whitespace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_machines;

    #[test]
    fn parser_machine_round_trips() {
        let machine = test_machines::single_token_parser();
        let bytes = encode_parser_machine(&machine);
        let decoded = decode_parser_machine(&bytes).unwrap();
        assert_eq!(decoded, machine);
    }

    #[test]
    fn lexer_machine_round_trips() {
        let machine = test_machines::letters_lexer();
        let bytes = encode_lexer_machine(&machine);
        let decoded = decode_lexer_machine(&bytes).unwrap();
        assert_eq!(decoded, machine);
    }

    #[test]
    fn bundle_round_trips() {
        let parser = test_machines::single_token_parser();
        let lexer = test_machines::letters_lexer();
        let whitespace = LexerStateMachine::empty();
        let bytes = encode_state_machines(&parser, &lexer, &whitespace);
        let (p, l, w) = decode_state_machines(&bytes).unwrap();
        assert_eq!(p, parser);
        assert_eq!(l, lexer);
        assert_eq!(w, whitespace);
    }

    #[test]
    fn encoding_is_deterministic() {
        let machine = test_machines::single_token_parser();
        assert_eq!(
            encode_parser_machine(&machine),
            encode_parser_machine(&machine)
        );
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = encode_lexer_machine(&LexerStateMachine::empty());
        bytes[0] = b'X';
        assert_eq!(decode_lexer_machine(&bytes), Err(CodecError::BadMagic));

        let mut bytes = encode_lexer_machine(&LexerStateMachine::empty());
        bytes[4] = 0xFF;
        assert!(matches!(
            decode_lexer_machine(&bytes),
            Err(CodecError::BadVersion(_))
        ));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = encode_parser_machine(&test_machines::single_token_parser());
        let err = decode_parser_machine(&bytes[..bytes.len() - 3]);
        assert!(matches!(err, Err(CodecError::Truncated(_))));
    }

    #[test]
    fn rejects_section_kind_mismatch() {
        let bytes = encode_lexer_machine(&LexerStateMachine::empty());
        assert!(matches!(
            decode_parser_machine(&bytes),
            Err(CodecError::BadKind { .. })
        ));
    }
}

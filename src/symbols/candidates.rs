// src/symbols/candidates.rs
use super::ticker_symbol::TickerSymbol;

pub const ALPHABET: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Lazily enumerates every candidate symbol starting with one letter:
/// all 3-letter strings, then 4-letter, then 5-letter, each block in
/// lexicographic order.
///
/// The position is a (length, index) pair where `index` encodes the
/// characters after the leading letter as a base-26 number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyCandidates {
    letter: char,
    len: usize,
    index: u64,
}

impl SurveyCandidates {
    /// Full candidate list for `letter`.
    pub fn for_letter(letter: char) -> Self {
        Self {
            letter,
            len: TickerSymbol::MIN_LEN,
            index: 0,
        }
    }

    /// Candidates strictly after `cursor`, the last symbol validated for this
    /// letter. A cursor filed under another letter is ignored.
    pub fn resume_after(letter: char, cursor: Option<&TickerSymbol>) -> Self {
        let mut candidates = Self::for_letter(letter);

        if let Some(cursor) = cursor {
            if cursor.letter() == letter {
                candidates.len = cursor.as_str().len();
                candidates.index = tail_index(cursor.as_str());
                candidates.advance();
            } else {
                log::warn!(
                    "Ignoring cursor {} while resuming survey of letter {}",
                    cursor,
                    letter
                );
            }
        }

        candidates
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    pub fn is_exhausted(&self) -> bool {
        self.len > TickerSymbol::MAX_LEN
    }

    /// Number of candidates not yet yielded.
    pub fn remaining(&self) -> u64 {
        if self.is_exhausted() {
            return 0;
        }
        let current_block = block_size(self.len) - self.index;
        let later_blocks: u64 = (self.len + 1..=TickerSymbol::MAX_LEN)
            .map(block_size)
            .sum();
        current_block + later_blocks
    }

    fn advance(&mut self) {
        self.index += 1;
        if self.index >= block_size(self.len) {
            self.len += 1;
            self.index = 0;
        }
    }

    fn current(&self) -> String {
        let tail_len = self.len - 1;
        let mut tail = vec!['A'; tail_len];
        let mut value = self.index;
        for slot in tail.iter_mut().rev() {
            *slot = ALPHABET[(value % 26) as usize];
            value /= 26;
        }

        let mut symbol = String::with_capacity(self.len);
        symbol.push(self.letter);
        symbol.extend(tail);
        symbol
    }
}

impl Iterator for SurveyCandidates {
    type Item = TickerSymbol;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let raw = self.current();
        self.advance();
        // Generated strings always satisfy the symbol rules.
        TickerSymbol::parse(&raw).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SurveyCandidates {}

/// Number of candidates of a given length for a fixed leading letter.
fn block_size(len: usize) -> u64 {
    26u64.pow((len - 1) as u32)
}

fn tail_index(symbol: &str) -> u64 {
    symbol
        .bytes()
        .skip(1)
        .fold(0, |acc, b| acc * 26 + u64::from(b - b'A'))
}

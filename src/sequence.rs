// Reception-number assignment: max + 1 under the sequence lock

use tracing::{info, warn};

use crate::error::DeskResult;
use crate::lock::ScriptLock;
use crate::store::{cell, is_blank, TabularStore};

/// Result of an assignment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A new number was written
    Assigned(u64),
    /// The row already carried a number; nothing was written
    AlreadyAssigned(u64),
}

impl Assignment {
    pub fn number(self) -> u64 {
        match self {
            Assignment::Assigned(n) | Assignment::AlreadyAssigned(n) => n,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Assignment::Assigned(_))
    }
}

/// Read a cell as a reception number.
///
/// Accepts positive whole numbers, with or without a zero fraction (`12`,
/// `12.0`). Anything else, including zero, negatives and `12.5`, is not a
/// number for sequencing purposes.
pub fn parse_sequence(value: &str) -> Option<u64> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b == b'0')
    {
        return None;
    }
    whole.parse::<u64>().ok().filter(|n| *n > 0)
}

/// `max(valid numbers) + 1`, or 1 when there are none
pub fn next_sequence<I, S>(values: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|value| parse_sequence(value.as_ref()))
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Hands out numbers for one column of one sheet. The scan and the write both
/// happen inside the lock, so processes sharing the lock file never collide.
#[derive(Debug, Clone)]
pub struct SequenceAssigner {
    lock: ScriptLock,
}

impl SequenceAssigner {
    pub fn new(lock: ScriptLock) -> Self {
        Self { lock }
    }

    /// Give `row` the next number in `column` unless it already has one
    pub fn assign(
        &self,
        store: &mut dyn TabularStore,
        column: usize,
        row: usize,
    ) -> DeskResult<Assignment> {
        self.lock.with_lock(|| {
            let current = store.read_row(row)?;
            let existing = cell(&current, column);

            if let Some(number) = parse_sequence(existing) {
                info!(
                    sheet = %store.name(),
                    row,
                    number,
                    "Row already numbered; leaving it untouched"
                );
                return Ok(Assignment::AlreadyAssigned(number));
            }
            if !is_blank(existing) {
                warn!(
                    sheet = %store.name(),
                    row,
                    value = %existing,
                    "Replacing a value that is not a valid number"
                );
            }

            let number = next_sequence(store.read_column(column)?);
            store.write_cell(row, column, &number.to_string())?;
            info!(sheet = %store.name(), row, number, "Assigned number");
            Ok(Assignment::Assigned(number))
        })
    }
}

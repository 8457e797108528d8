//! Subscribed instrument set
//!
//! Keyed by (exchange segment, security id) so value-equal instruments merge
//! no matter where they came from. Insertion order is kept for logs and for
//! resubscription.

use crate::instrument::Instrument;
use indexmap::IndexSet;

#[derive(Debug, Clone, Default)]
pub struct InstrumentRegistry {
    instruments: IndexSet<Instrument>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        InstrumentRegistry {
            instruments: IndexSet::new(),
        }
    }

    /// Insert; returns false when the instrument was already present
    pub fn add(&mut self, instrument: Instrument) -> bool {
        self.instruments.insert(instrument)
    }

    /// Remove by key; returns false when nothing matched
    pub fn remove(&mut self, instrument: &Instrument) -> bool {
        // shift_remove keeps the remaining order intact
        self.instruments.shift_remove(instrument)
    }

    pub fn extend<'a>(&mut self, instruments: impl IntoIterator<Item = &'a Instrument>) -> usize {
        instruments
            .into_iter()
            .filter(|i| self.add((*i).clone()))
            .count()
    }

    pub fn remove_all<'a>(&mut self, instruments: impl IntoIterator<Item = &'a Instrument>) -> usize {
        instruments.into_iter().filter(|i| self.remove(i)).count()
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.instruments.contains(instrument)
    }

    /// Current set in insertion order
    pub fn snapshot(&self) -> Vec<Instrument> {
        self.instruments.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

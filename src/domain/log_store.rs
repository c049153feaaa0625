use crate::domain::{ChangeCategory, LogEntry, RemoteError, StaleResponse};
use std::sync::Arc;
use thiserror::Error;

/// Per-category totals, always holding all five categories.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CategoryCounts {
    counts: [usize; 5],
}

impl CategoryCounts {
    pub fn get(&self, category: ChangeCategory) -> usize {
        self.counts[category.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(category, count)` pairs in declaration order, zeros included.
    pub fn iter(&self) -> impl Iterator<Item = (ChangeCategory, usize)> + '_ {
        ChangeCategory::ALL
            .iter()
            .map(|category| (*category, self.get(*category)))
    }
}

pub fn classify(entries: &[LogEntry]) -> CategoryCounts {
    let mut counts = CategoryCounts::default();
    for entry in entries {
        counts.counts[entry.category().index()] += 1;
    }
    counts
}

/// Newest-first copy of `entries` (storage order is oldest-first).
pub fn display_order(entries: &[LogEntry]) -> Vec<LogEntry> {
    newest_first(entries).cloned().collect()
}

/// Borrowing form of [`display_order`].
pub fn newest_first(entries: &[LogEntry]) -> impl Iterator<Item = &LogEntry> {
    entries.iter().rev()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RefreshTicket {
    seq: u64,
    clear_generation: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClearTicket {
    seq: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum LogStoreError {
    #[error(transparent)]
    Stale(#[from] StaleResponse),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Last successfully fetched log set plus bookkeeping for in-flight refresh/clear requests.
///
/// Contents only change through [`LogStore::apply_refresh`] and [`LogStore::apply_clear`], each
/// of which swaps the whole sequence at once.
#[derive(Clone, Debug, Default)]
pub struct LogStore {
    entries: Arc<Vec<LogEntry>>,
    next_seq: u64,
    pending_refresh: Option<u64>,
    pending_clear: Option<u64>,
    clear_generation: u64,
}

impl LogStore {
    pub fn entries(&self) -> &[LogEntry] {
        self.entries.as_slice()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_refreshing(&self) -> bool {
        self.pending_refresh.is_some()
    }

    pub fn is_clearing(&self) -> bool {
        self.pending_clear.is_some()
    }

    /// Starts a refresh. Any refresh still in flight is superseded by this one.
    pub fn begin_refresh(&mut self) -> RefreshTicket {
        let seq = self.bump_seq();
        self.pending_refresh = Some(seq);
        RefreshTicket {
            seq,
            clear_generation: self.clear_generation,
        }
    }

    /// Applies a fetch result. Returns the new entry count.
    ///
    /// Responses for superseded refreshes, or for refreshes issued before the latest successful
    /// clear, are discarded. On error the previous contents stay untouched.
    pub fn apply_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<LogEntry>, RemoteError>,
    ) -> Result<usize, LogStoreError> {
        let is_latest = self.pending_refresh == Some(ticket.seq);
        if is_latest {
            self.pending_refresh = None;
        }
        if !is_latest || ticket.clear_generation != self.clear_generation {
            return Err(StaleResponse.into());
        }

        let entries = result?;
        self.entries = Arc::new(entries);
        Ok(self.entries.len())
    }

    pub fn begin_clear(&mut self) -> ClearTicket {
        let seq = self.bump_seq();
        self.pending_clear = Some(seq);
        ClearTicket { seq }
    }

    /// Empties local contents only once the service confirmed the clear.
    pub fn apply_clear(
        &mut self,
        ticket: ClearTicket,
        result: Result<(), RemoteError>,
    ) -> Result<(), LogStoreError> {
        if self.pending_clear == Some(ticket.seq) {
            self.pending_clear = None;
        }
        result?;
        self.entries = Arc::new(Vec::new());
        self.clear_generation += 1;
        Ok(())
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

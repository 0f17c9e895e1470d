//! Status - 実行済み操作のカウンタ

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Number of operations a store has finished, by kind.
///
/// `failures` counts every operation (of any kind) whose backend call failed;
/// those operations are also counted under their own kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounts {
    pub retrieves: u64,
    pub inserts: u64,
    pub deletes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
    Retrieve,
    Insert,
    Delete,
}

impl Op {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Op::Retrieve => "retrieve",
            Op::Insert => "insert",
            Op::Delete => "delete",
        }
    }
}

/// Shared, lock-free counters. Only the worker writes.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    retrieves: AtomicU64,
    inserts: AtomicU64,
    deletes: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    pub(crate) fn record(&self, op: Op, ok: bool) {
        let counter = match op {
            Op::Retrieve => &self.retrieves,
            Op::Insert => &self.inserts,
            Op::Delete => &self.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> OperationCounts {
        OperationCounts {
            retrieves: self.retrieves.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_counted_alongside_their_kind() {
        let counters = Counters::default();
        counters.record(Op::Retrieve, true);
        counters.record(Op::Insert, false);
        counters.record(Op::Delete, true);
        counters.record(Op::Delete, true);

        assert_eq!(
            counters.snapshot(),
            OperationCounts {
                retrieves: 1,
                inserts: 1,
                deletes: 2,
                failures: 1,
            }
        );
    }
}

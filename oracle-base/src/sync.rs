use std::ops::RangeInclusive;

use oracle_core::RunnerServiceStatus;

/// Split `start..=current` into consecutive inclusive ranges of at most
/// `max_blocks` blocks. Nothing to do when `current <= start`.
pub fn block_ranges(start: u64, current: u64, max_blocks: u64) -> Vec<RangeInclusive<u64>> {
    if current <= start || max_blocks == 0 {
        return vec![];
    }
    let mut ranges = vec![];
    let mut from = start;
    while from <= current {
        let to = from.saturating_add(max_blocks - 1).min(current);
        ranges.push(from..=to);
        if to == current {
            break;
        }
        from = to + 1;
    }
    ranges
}

/// Resumable scan position of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    start_block_height: u64,
    current_block_height: u64,
    max_blocks: u64,
}

impl SyncCursor {
    /// Resume from the last persisted height, else from the configured start.
    /// A start of zero or one beyond the chain head is clamped to the head.
    pub fn new(
        configured_start: u64,
        last_status: Option<&RunnerServiceStatus>,
        current_block_height: u64,
        max_blocks: u64,
    ) -> Self {
        let mut start_block_height = match last_status {
            Some(status) if status.block_height != 0 => status.block_height,
            _ => configured_start,
        };
        if start_block_height == 0 || start_block_height > current_block_height {
            start_block_height = current_block_height;
        }
        Self {
            start_block_height,
            current_block_height,
            max_blocks,
        }
    }

    /// First block of the next scan
    pub fn start_block_height(&self) -> u64 {
        self.start_block_height
    }

    /// Latest known chain head
    pub fn current_block_height(&self) -> u64 {
        self.current_block_height
    }

    /// Record a new chain head.
    pub fn update_current(&mut self, height: u64) {
        self.current_block_height = height;
    }

    /// Ranges still to scan, bounded by the per-query block limit.
    pub fn pending_ranges(&self) -> Vec<RangeInclusive<u64>> {
        block_ranges(self.start_block_height, self.current_block_height, self.max_blocks)
    }

    /// Mark everything up to the chain head as scanned.
    pub fn advance(&mut self) {
        self.start_block_height = self.current_block_height;
    }
}

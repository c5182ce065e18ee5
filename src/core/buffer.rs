//! Buffer management for the streaming scanner.
//!
//! A [`BufferManager`] hands the scanner contiguous spans of input and
//! addresses them by absolute character offset, so a loop body can be replayed
//! by seeking back to a recorded position.
//!
//! ```text
//!  segment 0            segment 1            segment 2
//! ┌────────────────────┬────────────────────┬──────────┐
//! │ ....while....      │ ..........         │ ../while │
//! └────────────────────┴────────────────────┴──────────┘
//!  ^ start = 0          ^ start = cap        ^ start = 2*cap
//! ```
//!
//! While no loop is open, a full segment is recycled before the next read.
//! While loops are open (`grow_depth > 0`) segments accumulate so every
//! recorded resume position stays resident; when the outermost loop closes,
//! [`BufferManager::trim`] hands the consumed ones back to the pool.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::utils::error::{TemplateError, TemplateResult};
use crate::utils::source::CharSource;

/// Idle buffers kept by the shared pool.
const SHARED_POOL_RETAINED: usize = 32;

lazy_static! {
    static ref SHARED_POOL: Arc<BufferPool> = Arc::new(BufferPool::new(SHARED_POOL_RETAINED));
}

/// The pool used by renders that don't supply their own.
pub fn shared_pool() -> Arc<BufferPool> {
    Arc::clone(&SHARED_POOL)
}

/// A pool of fixed-size character buffers shared across renders.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<char>>>,
    max_retained: usize,
    outstanding: AtomicUsize,
}

impl BufferPool {
    pub fn new(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_retained,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Check out a buffer of exactly `capacity` characters.
    pub fn checkout(&self, capacity: usize) -> Vec<char> {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        match free.iter().position(|buf| buf.len() == capacity) {
            Some(idx) => free.swap_remove(idx),
            None => vec!['\0'; capacity],
        }
    }

    /// Return a buffer obtained from [`BufferPool::checkout`].
    pub fn give_back(&self, buf: Vec<char>) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        let mut free = self.free.lock().unwrap_or_else(|e| e.into_inner());
        if free.len() < self.max_retained {
            free.push(buf);
        }
    }

    /// Buffers currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// A resident run of input starting at absolute offset `start`.
#[derive(Debug)]
struct Segment {
    start: usize,
    data: Vec<char>,
    len: usize,
}

impl Segment {
    fn end(&self) -> usize {
        self.start + self.len
    }

    fn is_full(&self) -> bool {
        self.len == self.data.len()
    }
}

enum Mode<'s> {
    /// One in-memory span; no reads, no pooling
    Fixed,
    /// Pooled segments refilled from a source
    Streaming {
        source: &'s mut dyn CharSource,
        pool: Arc<BufferPool>,
        capacity: usize,
        eof: bool,
    },
}

/// Per-render buffer session.
pub struct BufferManager<'s> {
    mode: Mode<'s>,
    segments: VecDeque<Segment>,
    cursor: usize,
    grow_depth: usize,
}

impl<'s> BufferManager<'s> {
    /// Buffers over an in-memory text.
    pub fn fixed(text: &str) -> Self {
        let data: Vec<char> = text.chars().collect();
        let len = data.len();
        Self {
            mode: Mode::Fixed,
            segments: VecDeque::from([Segment {
                start: 0,
                data,
                len,
            }]),
            cursor: 0,
            grow_depth: 0,
        }
    }

    /// Pooled buffers of `capacity` characters refilled from `source`.
    pub fn streaming(
        source: &'s mut dyn CharSource,
        capacity: usize,
        pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            mode: Mode::Streaming {
                source,
                pool,
                capacity: capacity.max(1),
                eof: false,
            },
            segments: VecDeque::new(),
            cursor: 0,
            grow_depth: 0,
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.mode, Mode::Fixed)
    }

    /// Absolute offset of the cursor.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Current loop-nesting depth.
    pub fn grow_depth(&self) -> usize {
        self.grow_depth
    }

    /// Number of resident segments.
    pub fn resident_segments(&self) -> usize {
        self.segments.len()
    }

    /// Next contiguous span of unread input; empty at end of input.
    pub fn read_span(&mut self) -> TemplateResult<&[char]> {
        loop {
            if let Some(idx) = self.segment_index(self.cursor) {
                let segment = &self.segments[idx];
                let offset = self.cursor - segment.start;
                return Ok(&segment.data[offset..segment.len]);
            }
            if !self.fill()? {
                return Ok(&[]);
            }
        }
    }

    /// Consume `n` characters of the current span.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.cursor + n <= self.resident_end());
        self.cursor += n;
    }

    /// Move the cursor to a previously visited absolute offset.
    pub fn seek(&mut self, position: usize) -> TemplateResult<()> {
        let start = self.segments.front().map(|s| s.start).unwrap_or(0);
        let end = self.resident_end();
        if position < start || position > end {
            return Err(TemplateError::BufferPosition {
                position,
                start,
                end,
            });
        }
        log::trace!("seek {} -> {}", self.cursor, position);
        self.cursor = position;
        Ok(())
    }

    /// Enter (`true`) or leave (`false`) a loop body.
    ///
    /// Leaving the outermost loop trims consumed segments.
    pub fn set_grow(&mut self, grow: bool) {
        if grow {
            self.grow_depth += 1;
            return;
        }
        match self.grow_depth.checked_sub(1) {
            Some(depth) => {
                self.grow_depth = depth;
                if depth == 0 {
                    self.trim();
                }
            }
            None => debug_assert!(false, "set_grow(false) without matching set_grow(true)"),
        }
    }

    /// Release every segment before the one holding the cursor.
    ///
    /// Does nothing while a loop is open.
    pub fn trim(&mut self) {
        if self.grow_depth > 0 {
            return;
        }
        while self.segments.len() > 1 {
            if self.segments[0].end() > self.cursor {
                break;
            }
            if let Some(segment) = self.segments.pop_front() {
                self.recycle(segment);
            }
        }
    }

    /// Return all pooled memory. Also runs on drop.
    pub fn release(&mut self) {
        while let Some(segment) = self.segments.pop_front() {
            self.recycle(segment);
        }
    }

    fn resident_end(&self) -> usize {
        self.segments.back().map(Segment::end).unwrap_or(self.cursor)
    }

    fn segment_index(&self, position: usize) -> Option<usize> {
        self.segments
            .iter()
            .rposition(|s| s.start <= position && position < s.end())
    }

    fn recycle(&self, segment: Segment) {
        if let Mode::Streaming { pool, .. } = &self.mode {
            pool.give_back(segment.data);
        }
    }

    /// Read more input at the cursor. Returns false at end of input.
    fn fill(&mut self) -> TemplateResult<bool> {
        let needs_segment = self.segments.back().map(Segment::is_full).unwrap_or(true);

        let Mode::Streaming {
            source,
            pool,
            capacity,
            eof,
        } = &mut self.mode
        else {
            return Ok(false);
        };
        if *eof {
            return Ok(false);
        }

        if needs_segment {
            let data = if self.grow_depth == 0 {
                // Nothing before the cursor can be revisited: reuse the
                // newest buffer and hand the rest back
                let reused = self.segments.pop_back().map(|s| s.data);
                while let Some(old) = self.segments.pop_front() {
                    pool.give_back(old.data);
                }
                reused.unwrap_or_else(|| pool.checkout(*capacity))
            } else {
                pool.checkout(*capacity)
            };
            self.segments.push_back(Segment {
                start: self.cursor,
                data,
                len: 0,
            });
        }

        let Some(segment) = self.segments.back_mut() else {
            return Ok(false);
        };
        let read = source.read(&mut segment.data[segment.len..])?;
        if read == 0 {
            *eof = true;
            return Ok(false);
        }
        let offset = segment.end();
        segment.len += read;
        log::trace!(
            "read {} chars at offset {} ({} segments resident)",
            read,
            offset,
            self.segments.len()
        );
        Ok(true)
    }
}

impl Drop for BufferManager<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::source::StrSource;

    fn collect(buffers: &mut BufferManager<'_>, n: usize) -> String {
        let mut out = String::new();
        while out.chars().count() < n {
            let span = buffers.read_span().unwrap();
            if span.is_empty() {
                break;
            }
            let take = span.len().min(n - out.chars().count());
            out.extend(&span[..take]);
            buffers.advance(take);
        }
        out
    }

    #[test]
    fn test_fixed_mode_is_one_span() {
        let mut buffers = BufferManager::fixed("hello");
        assert!(buffers.is_fixed());
        assert_eq!(buffers.read_span().unwrap().len(), 5);
        buffers.advance(5);
        assert!(buffers.read_span().unwrap().is_empty());
        buffers.seek(1).unwrap();
        assert_eq!(collect(&mut buffers, 10), "ello");
    }

    #[test]
    fn test_streaming_reads_in_capacity_chunks() {
        let pool = Arc::new(BufferPool::new(4));
        let mut source = StrSource::new("abcdefghij");
        let mut buffers = BufferManager::streaming(&mut source, 3, Arc::clone(&pool));
        assert_eq!(buffers.read_span().unwrap(), &['a', 'b', 'c']);
        assert_eq!(collect(&mut buffers, 100), "abcdefghij");
        // Recycling keeps a single segment resident outside loops
        assert_eq!(buffers.resident_segments(), 1);
    }

    #[test]
    fn test_grow_retains_and_seek_replays() {
        let pool = Arc::new(BufferPool::new(4));
        let mut source = StrSource::new("0123456789abcdef");
        let mut buffers = BufferManager::streaming(&mut source, 4, Arc::clone(&pool));
        assert_eq!(collect(&mut buffers, 2), "01");

        buffers.set_grow(true);
        let mark = buffers.position();
        assert_eq!(collect(&mut buffers, 9), "23456789a");
        assert!(buffers.resident_segments() >= 3);

        buffers.seek(mark).unwrap();
        assert_eq!(collect(&mut buffers, 9), "23456789a");

        buffers.set_grow(false);
        assert_eq!(buffers.grow_depth(), 0);
        assert_eq!(buffers.resident_segments(), 1);
        assert_eq!(collect(&mut buffers, 100), "bcdef");
    }

    #[test]
    fn test_nested_grow_keeps_retention_until_outermost_exit() {
        let pool = Arc::new(BufferPool::new(4));
        let mut source = StrSource::new("abcdefghijklmnop");
        let mut buffers = BufferManager::streaming(&mut source, 2, Arc::clone(&pool));

        buffers.set_grow(true);
        let outer = buffers.position();
        collect(&mut buffers, 3);
        buffers.set_grow(true);
        collect(&mut buffers, 5);
        buffers.set_grow(false);

        // Inner exit must not trim: the outer resume point is still needed
        buffers.seek(outer).unwrap();
        assert_eq!(collect(&mut buffers, 8), "abcdefgh");
        buffers.set_grow(false);
        assert!(buffers.seek(outer).is_err());
    }

    #[test]
    fn test_seek_outside_retained_region_fails() {
        let pool = Arc::new(BufferPool::new(4));
        let mut source = StrSource::new("abcdefgh");
        let mut buffers = BufferManager::streaming(&mut source, 2, Arc::clone(&pool));
        collect(&mut buffers, 6);
        let err = buffers.seek(0).unwrap_err();
        assert!(matches!(err, TemplateError::BufferPosition { position: 0, .. }));
        assert!(buffers.seek(100).is_err());
    }

    #[test]
    fn test_release_on_drop() {
        let pool = Arc::new(BufferPool::new(8));
        {
            let mut source = StrSource::new("abcdefghijkl");
            let mut buffers = BufferManager::streaming(&mut source, 2, Arc::clone(&pool));
            buffers.set_grow(true);
            collect(&mut buffers, 12);
            assert!(pool.outstanding() >= 6);
        }
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.idle() > 0);
    }

    #[test]
    fn test_pool_reuses_matching_capacity() {
        let pool = BufferPool::new(2);
        let buf = pool.checkout(8);
        pool.give_back(buf);
        assert_eq!(pool.idle(), 1);
        let again = pool.checkout(8);
        assert_eq!(again.len(), 8);
        assert_eq!(pool.idle(), 0);
        pool.give_back(again);
        pool.give_back(vec!['\0'; 8]);
        pool.give_back(vec!['\0'; 8]);
        assert_eq!(pool.idle(), 2);
    }
}

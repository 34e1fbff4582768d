//! Pagination walker
//!
//! A pure state machine that hands out page numbers for a paged listing and
//! records which page was last committed. It never hands out a page twice,
//! so a resumed walk continues strictly after the persisted cursor.

/// States of a paged walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Nothing fetched yet
    Start,

    /// Page `n` has been handed out and not completed
    FetchingPage(u32),

    /// Page `n` completed and announced a successor
    HasMore(u32),

    /// The listing ended (terminal success)
    Exhausted,

    /// A page failed (terminal)
    Failed,
}

/// Walks a 1-based paged listing
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    state: WalkState,
    last_completed: u32,
    max_pages: u32,
}

impl PaginationWalker {
    /// Creates a walker starting at page 1
    pub fn new(max_pages: u32) -> Self {
        Self {
            state: WalkState::Start,
            last_completed: 0,
            max_pages,
        }
    }

    /// Creates a walker continuing after committed page `cursor`
    ///
    /// A cursor of 0 means nothing was committed yet.
    pub fn resume_after(cursor: u32, max_pages: u32) -> Self {
        let state = if cursor == 0 {
            WalkState::Start
        } else if cursor >= max_pages {
            WalkState::Exhausted
        } else {
            WalkState::HasMore(cursor)
        };
        Self {
            state,
            last_completed: cursor,
            max_pages,
        }
    }

    /// Hands out the next page number, or None once the walk is over
    pub fn next_page(&mut self) -> Option<u32> {
        let page = match self.state {
            WalkState::Start => 1,
            WalkState::HasMore(n) => n + 1,
            WalkState::FetchingPage(_) | WalkState::Exhausted | WalkState::Failed => return None,
        };
        self.state = WalkState::FetchingPage(page);
        Some(page)
    }

    /// Records the outcome of the page being fetched
    ///
    /// The walk continues only when the page produced records and announced
    /// a successor, and the page cap has not been reached.
    pub fn complete(&mut self, record_count: usize, has_next: bool) {
        let WalkState::FetchingPage(page) = self.state else {
            return;
        };
        self.last_completed = page;

        self.state = if record_count == 0 || !has_next {
            WalkState::Exhausted
        } else if page >= self.max_pages {
            tracing::warn!("Stopping pagination at the {} page limit", self.max_pages);
            WalkState::Exhausted
        } else {
            WalkState::HasMore(page)
        };
    }

    /// Marks the walk failed; the last completed page is kept
    pub fn fail(&mut self) {
        self.state = WalkState::Failed;
    }

    /// Returns the last successfully completed page (0 if none)
    pub fn last_completed(&self) -> u32 {
        self.last_completed
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == WalkState::Exhausted
    }
}

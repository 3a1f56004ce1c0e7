use crate::catalog::{Comment, CommentBatch};

/// Offset/limit for the next page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRefusal {
    /// A page for this track is already being fetched
    InFlight,
    /// Everything the server reported has been loaded
    Exhausted,
}

/// Result of applying one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUpdate {
    pub added: Vec<Comment>,
    /// The page started a fresh listing
    pub reset: bool,
    pub loaded: usize,
    pub total: usize,
}

/// Append-only comment accumulator for the current track. At most one request
/// is in flight at a time.
#[derive(Debug)]
pub struct CommentPager {
    comments: Vec<Comment>,
    offset: usize,
    total: Option<usize>,
    page_size: usize,
    in_flight: Option<bool>,
}

impl CommentPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            comments: Vec::new(),
            offset: 0,
            total: None,
            page_size: page_size.max(1),
            in_flight: None,
        }
    }

    /// Forget everything, including any request in flight.
    pub fn reset(&mut self) {
        self.comments.clear();
        self.offset = 0;
        self.total = None;
        self.in_flight = None;
    }

    pub fn begin(&mut self, reset: bool) -> Result<PageRequest, PageRefusal> {
        if self.in_flight.is_some() {
            return Err(PageRefusal::InFlight);
        }
        if reset {
            self.comments.clear();
            self.offset = 0;
            self.total = None;
        } else if !self.has_more() {
            return Err(PageRefusal::Exhausted);
        }
        self.in_flight = Some(reset);
        Ok(PageRequest {
            offset: self.offset,
            limit: self.page_size,
        })
    }

    pub fn complete(&mut self, batch: CommentBatch) -> PageUpdate {
        let reset = self.in_flight.take().unwrap_or(false);
        let added = batch.comments;

        self.offset += added.len();
        self.comments.extend(added.iter().cloned());
        // An empty page means the server has nothing more, whatever it claims
        let total = if added.is_empty() {
            self.comments.len()
        } else {
            batch.total.max(self.comments.len())
        };
        self.total = Some(total);

        PageUpdate {
            added,
            reset,
            loaded: self.comments.len(),
            total,
        }
    }

    /// Give up on the in-flight request, keeping what was loaded.
    pub fn fail(&mut self) {
        self.in_flight = None;
    }

    pub fn has_more(&self) -> bool {
        self.total.map_or(true, |t| self.comments.len() < t)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn loaded(&self) -> usize {
        self.comments.len()
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }
}

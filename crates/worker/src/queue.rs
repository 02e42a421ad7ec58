//! Messages carried by the shared work queue.

/// An ordered group of raw wire events submitted together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    events: Vec<String>,
}

impl Batch {
    pub fn new(events: Vec<String>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn into_events(self) -> Vec<String> {
        self.events
    }
}

impl From<Vec<String>> for Batch {
    fn from(events: Vec<String>) -> Self {
        Self::new(events)
    }
}

impl From<Vec<&str>> for Batch {
    fn from(events: Vec<&str>) -> Self {
        Self::new(events.into_iter().map(str::to_owned).collect())
    }
}

impl FromIterator<String> for Batch {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Queue item: work, or the per-worker shutdown sentinel.
///
/// Each worker consumes exactly one `Shutdown`; the engine enqueues one per
/// worker after every batch, so FIFO order guarantees all batches are seen first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Batch(Batch),
    Shutdown,
}

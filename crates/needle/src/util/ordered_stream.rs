use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Yields items received out of order strictly by their sequence number, starting from 0.
pub struct OrderedStream<T> {
    buffer: BTreeMap<u64, T>,
    next_seq: u64,
    // sequence, item
    rx: mpsc::UnboundedReceiver<(u64, T)>,
}

impl<T> OrderedStream<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<(u64, T)>) -> Self {
        Self {
            buffer: BTreeMap::new(),
            next_seq: 0,
            rx,
        }
    }

    /// Sequence number of the item `next` is waiting for.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Returns `None` once every sender is dropped, even if later items are still buffered.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.buffer.remove(&self.next_seq) {
                self.next_seq += 1;
                return Some(item);
            }

            match self.rx.recv().await {
                Some((seq, item)) if seq == self.next_seq => {
                    self.next_seq += 1;
                    return Some(item);
                }
                Some((seq, item)) => {
                    self.buffer.insert(seq, item);
                }
                None => return None,
            }
        }
    }
}

//! Wrap-around mini-batch cursor.

/// Walks a dataset in fixed-size batches. A batch that runs off the end
/// continues from the start, so every batch is full unless the dataset is
/// smaller than the batch size.
#[derive(Clone, Debug)]
pub struct BatchCursor {
    len: usize,
    batch_size: usize,
    offset: usize,
}

impl BatchCursor {
    pub fn new(len: usize, batch_size: usize) -> Self {
        Self {
            len,
            batch_size: batch_size.max(1),
            offset: 0,
        }
    }

    /// Batches per epoch; at least one for a non-empty dataset.
    pub fn batches_per_epoch(&self) -> usize {
        if self.len == 0 {
            0
        } else {
            (self.len / self.batch_size).max(1)
        }
    }

    /// Row indices of the next batch.
    pub fn next_batch(&mut self) -> Vec<usize> {
        if self.len == 0 {
            return Vec::new();
        }
        let size = self.batch_size.min(self.len);
        let batch = (0..size).map(|i| (self.offset + i) % self.len).collect();
        self.offset = (self.offset + size) % self.len;
        batch
    }
}

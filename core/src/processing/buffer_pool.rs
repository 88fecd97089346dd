use crate::prelude::DetectError;

/// Scoped pool of filter scratch buffers that bounds peak allocation.
pub struct BufferPool {
    buffers: Vec<Vec<f64>>,
    outstanding: usize,
    max_capacity: usize,
}

impl BufferPool {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            outstanding: 0,
            max_capacity,
        }
    }

    /// Hands out a zeroed buffer, reusing a released one when available.
    pub fn checkout(&mut self, length: usize) -> Result<Vec<f64>, DetectError> {
        if let Some(mut buffer) = self.buffers.pop() {
            buffer.clear();
            buffer.resize(length, 0.0);
            self.outstanding += 1;
            Ok(buffer)
        } else if self.outstanding < self.max_capacity {
            self.outstanding += 1;
            Ok(vec![0.0; length])
        } else {
            Err(DetectError::RuntimeDetectionFailure(
                "scratch buffer pool depleted".to_string(),
            ))
        }
    }

    /// Returns a buffer back to the pool for reuse.
    pub fn release(&mut self, buffer: Vec<f64>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
        self.outstanding = 0;
    }
}

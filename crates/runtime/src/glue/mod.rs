//! Glue binding: the sole externally visible handle to the I/O image.
//!
//! Scan engine, Modbus slave, and every service receive a cheap clone of
//! [`GlueBinding`] rather than touching the image directly, so the buffer
//! lock is always acquired the same way no matter who's calling.

pub mod image;

use std::sync::Arc;

use tokio::sync::Mutex;

use image::IoImageState;

#[derive(Clone)]
pub struct GlueBinding {
    image: Arc<Mutex<IoImageState>>,
    pub common_tick_time_ns: u64,
}

impl GlueBinding {
    pub fn new(common_tick_time_ns: u64) -> Self {
        Self {
            image: Arc::new(Mutex::new(IoImageState::new())),
            common_tick_time_ns,
        }
    }

    /// Scoped acquisition for async callers (Modbus connection workers).
    /// The lock is held for the closure's entire body, matching the
    /// coarse-grained locking the original glue header uses.
    pub async fn with_locked<R>(&self, f: impl FnOnce(&mut IoImageState) -> R) -> R {
        let mut guard = self.image.lock().await;
        f(&mut guard)
    }

    /// Scoped acquisition for the synchronous scan thread, which never awaits.
    pub fn with_locked_blocking<R>(&self, f: impl FnOnce(&mut IoImageState) -> R) -> R {
        let mut guard = self.image.blocking_lock();
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{BoolArray, WordArray};

    #[tokio::test]
    async fn with_locked_roundtrips_a_cell() {
        let glue = GlueBinding::new(50_000_000);
        glue.with_locked(|image| image.bind_word(WordArray::Output, 0, 7)).await;
        let value = glue.with_locked(|image| image.word_at(WordArray::Output, 0)).await;
        assert_eq!(value, Ok(7));
    }

    #[test]
    fn with_locked_blocking_works_outside_a_runtime() {
        let glue = GlueBinding::new(50_000_000);
        glue.with_locked_blocking(|image| image.bind_bool(BoolArray::Input, 0, 0, true));
        let value = glue.with_locked_blocking(|image| image.bool_at(BoolArray::Input, 0, 0));
        assert_eq!(value, Ok(true));
    }
}

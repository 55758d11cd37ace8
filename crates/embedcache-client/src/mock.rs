//! Mock embedder for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Embedder, EmbedderError};

/// Mock embedder that produces deterministic vectors.
///
/// Each text maps to the same non-zero vector on every call, so tests can
/// compare cache contents against `MockEmbedder::vector_for`. Failures can be
/// scripted for the first N calls to exercise retry handling.
pub struct MockEmbedder {
    dimension: usize,
    fail_first: usize,
    short_first: usize,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<String>>>,
}

impl MockEmbedder {
    /// Create a mock producing vectors of `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_first: 0,
            short_first: 0,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return an API error for the first `n` calls.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Fail every call.
    pub fn always_failing(self) -> Self {
        self.failing_first(usize::MAX)
    }

    /// Drop the last vector from the response for the first `n` calls
    /// (after any scripted failures).
    pub fn short_first(mut self, n: usize) -> Self {
        self.short_first = n;
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts of every call, including failed ones.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// The vector this mock returns for `text`.
    pub fn vector_for(text: &str, dimension: usize) -> Vec<f32> {
        // FNV-1a over the text, then one derived value per dimension
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (0..dimension as u64)
            .map(|i| {
                let mixed = hash.rotate_left((i * 7 % 64) as u32) ^ i.wrapping_mul(0x9e37_79b9);
                // (0.001, 1.0], never zero
                ((mixed % 1000) as f32 + 1.0) / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn model_id(&self) -> &str {
        "mock"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(texts.to_vec());
        }

        if call < self.fail_first {
            return Err(EmbedderError::ApiError(format!(
                "scripted failure on call {}",
                call + 1
            )));
        }

        let mut vectors: Vec<Vec<f32>> = texts
            .iter()
            .map(|t| Self::vector_for(t, self.dimension))
            .collect();

        if call < self.fail_first.saturating_add(self.short_first) {
            vectors.pop();
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vector_for_is_deterministic_and_non_zero() {
        let a = MockEmbedder::vector_for("paper on control theory", 8);
        let b = MockEmbedder::vector_for("paper on control theory", 8);
        let c = MockEmbedder::vector_for("need: funding for robotics", 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
        assert!(a.iter().all(|v| *v > 0.0));
    }

    #[tokio::test]
    async fn test_mock_embed_counts_calls() {
        let mock = MockEmbedder::new(3);
        let out = mock.embed(&texts(&["a", "b"])).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], MockEmbedder::vector_for("a", 3));
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.requests(), vec![texts(&["a", "b"])]);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let mock = MockEmbedder::new(3).failing_first(2);
        assert!(mock.embed(&texts(&["a"])).await.is_err());
        assert!(mock.embed(&texts(&["a"])).await.is_err());
        assert!(mock.embed(&texts(&["a"])).await.is_ok());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_short_response() {
        let mock = MockEmbedder::new(3).short_first(1);
        assert_eq!(mock.embed(&texts(&["a", "b"])).await.unwrap().len(), 1);
        assert_eq!(mock.embed(&texts(&["a", "b"])).await.unwrap().len(), 2);
    }
}

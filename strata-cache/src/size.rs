//! Footprint estimation for the LRU evictor.

use crate::entity::Cacheable;

/// Estimates the bytes an object occupies.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, object: &dyn Cacheable) -> u64;
}

/// Trusts each object's own [`Cacheable::approximate_size`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedSize;

impl SizeEstimator for ReportedSize {
    fn estimate(&self, object: &dyn Cacheable) -> u64 {
        object.approximate_size() as u64
    }
}

/// Charges every object the same number of bytes.
#[derive(Debug, Clone, Copy)]
pub struct FixedSize(pub u64);

impl SizeEstimator for FixedSize {
    fn estimate(&self, _object: &dyn Cacheable) -> u64 {
        self.0
    }
}

impl<F> SizeEstimator for F
where
    F: Fn(&dyn Cacheable) -> u64 + Send + Sync,
{
    fn estimate(&self, object: &dyn Cacheable) -> u64 {
        self(object)
    }
}

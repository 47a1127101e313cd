//! Progress callbacks for the remeshing driver.
//!
//! [`isotropic_remesh_with_progress`](crate::algo::remesh::isotropic_remesh_with_progress)
//! reports once before every pass, once before fin removal and once when it
//! is done, so `total` is the pass count plus one.
//!
//! # Example
//!
//! ```
//! use tessera::algo::Progress;
//!
//! let progress = Progress::new(|current, total, stage| {
//!     println!("[{}/{}] {}", current, total, stage);
//! });
//! progress.report(0, 6, "Remeshing");
//! ```

/// Callback invoked with `(current, total, stage)`.
///
/// `current` counts completed steps and reaches `total` on the last call.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report that `current` of `total` steps are complete and `stage` is next.
    #[inline]
    pub fn report(&self, current: usize, total: usize, stage: &str) {
        (self.callback)(current, total, stage);
    }

    /// A reporter that discards every update.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_report_forwards_stage() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, stage: &str| {
            sink.lock().unwrap().push((current, total, stage.to_string()));
        });
        progress.report(0, 3, "Remeshing");
        progress.report(3, 3, "Done");
        Progress::default().report(1, 1, "ignored");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(0, 3, "Remeshing".to_string()), (3, 3, "Done".to_string())]
        );
    }
}

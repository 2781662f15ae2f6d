use parking_lot::Mutex;
use std::sync::Arc;

/// Ordered record of calls made against test doubles.
///
/// Entries are `"<op> <subject> [details]"`, e.g. `"create_domain delegatio-1"`
/// or `"exec delegatio-2 kubeadm join ..."`.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }

    /// Index of the first entry starting with `prefix`.
    pub fn first(&self, prefix: &str) -> Option<usize> {
        self.entries.lock().iter().position(|e| e.starts_with(prefix))
    }

    /// Index of the last entry starting with `prefix`.
    pub fn last(&self, prefix: &str) -> Option<usize> {
        self.entries.lock().iter().rposition(|e| e.starts_with(prefix))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

//! Label-keyed entry groups shared by the teardown registries.
//!
//! # Responsibility
//! - Group registry entries under caller-chosen labels.
//! - Hand a label's entries back in one piece for teardown.
//!
//! # Invariants
//! - A label is present iff it holds at least one entry.
//! - Entries inside a label keep registration order.
//! - Labels keep the order in which they were first populated.

/// Label used when the caller does not supply one.
pub const DEFAULT_LABEL: &str = "generic";

/// Ordered `label -> entries` mapping.
///
/// Registries hold at most dozens of labels, so lookups are linear scans over
/// a vector that also records population order.
#[derive(Debug)]
pub struct LabeledEntries<T> {
    groups: Vec<(String, Vec<T>)>,
}

impl<T> Default for LabeledEntries<T> {
    fn default() -> Self {
        Self { groups: Vec::new() }
    }
}

impl<T> LabeledEntries<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry under `label`, creating the label when absent.
    pub fn append(&mut self, label: &str, entry: T) {
        match self.groups.iter_mut().find(|(name, _)| name.as_str() == label) {
            Some((_, entries)) => entries.push(entry),
            None => self.groups.push((label.to_string(), vec![entry])),
        }
    }

    /// Detaches every entry stored under `label`.
    ///
    /// Returns `None` when the label is absent. The label is gone from the
    /// mapping before the caller sees the entries.
    pub fn take(&mut self, label: &str) -> Option<Vec<T>> {
        let index = self.groups.iter().position(|(name, _)| name.as_str() == label)?;
        let (_, entries) = self.groups.remove(index);
        Some(entries)
    }

    /// Snapshot of present labels, most recently populated first.
    pub fn labels_newest_first(&self) -> Vec<String> {
        self.groups
            .iter()
            .rev()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Present labels in population order.
    pub fn labels(&self) -> Vec<String> {
        self.groups.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.groups.iter().any(|(name, _)| name.as_str() == label)
    }

    /// Number of entries stored under `label`.
    pub fn entries_in(&self, label: &str) -> usize {
        self.groups
            .iter()
            .find(|(name, _)| name.as_str() == label)
            .map_or(0, |(_, entries)| entries.len())
    }

    /// Total entries across all labels.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

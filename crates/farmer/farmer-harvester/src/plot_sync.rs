//! Plot-sync delta placeholders (spec.md §4.5): just enough shape for the
//! session manager's observer callback to decide "did anything change" --
//! plot enumeration and disk I/O live in the harvester process itself and
//! are out of scope here (spec.md's harvester-internals non-goal).

/// One incremental plot-sync report from a harvester.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotSyncDelta {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub invalid: Vec<String>,
    pub keys_missing: Vec<String>,
    pub duplicates: Vec<String>,
}

impl PlotSyncDelta {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.invalid.is_empty()
            && self.keys_missing.is_empty()
            && self.duplicates.is_empty()
    }
}

/// A plot-sync receiver yields one of these per message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlotSyncEvent {
    Delta(PlotSyncDelta),
    InitialSyncComplete,
}

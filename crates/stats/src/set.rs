use heli_core::{Sample, SampleWindow, StatScope, StatisticsSnapshot};

use crate::Statistic;

/// Named statistics owned by one buffer, each bound to the region it observes.
#[derive(Debug, Default)]
pub struct StatisticSet {
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    scope: StatScope,
    stat: Box<dyn Statistic>,
}

impl StatisticSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `stat` under `name`, replacing any previous entry of that name.
    /// It is rebuilt against `window` so it starts in sync.
    pub fn attach(
        &mut self,
        name: impl Into<String>,
        scope: StatScope,
        mut stat: Box<dyn Statistic>,
        window: &dyn SampleWindow,
    ) {
        let name = name.into();
        stat.rebuild(window);
        self.entries.retain(|e| e.name != name);
        self.entries.push(Entry { name, scope, stat });
    }

    pub fn detach(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Whether any entry observes `scope`.
    pub fn watches(&self, scope: StatScope) -> bool {
        self.entries.iter().any(|e| e.scope == scope)
    }

    /// Forward one change to every entry observing `scope`.
    pub fn notify(
        &mut self,
        scope: StatScope,
        old: Option<Sample>,
        new: Option<Sample>,
        window: &dyn SampleWindow,
    ) {
        if old.is_none() && new.is_none() {
            return;
        }
        for entry in self.entries.iter_mut().filter(|e| e.scope == scope) {
            entry.stat.update(old, new, window);
        }
    }

    pub fn rebuild(&mut self, scope: StatScope, window: &dyn SampleWindow) {
        for entry in self.entries.iter_mut().filter(|e| e.scope == scope) {
            entry.stat.rebuild(window);
        }
    }

    pub fn snapshot(&self, graph: &dyn SampleWindow, buffer: &dyn SampleWindow) -> StatisticsSnapshot {
        let mut snapshot = StatisticsSnapshot::default();
        for entry in &self.entries {
            let window = match entry.scope {
                StatScope::Graph => graph,
                StatScope::Buffer => buffer,
            };
            snapshot.insert(entry.name.clone(), entry.stat.value(window));
        }
        snapshot
    }
}

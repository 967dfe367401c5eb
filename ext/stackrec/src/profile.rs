use std::collections::HashMap;
use std::time::SystemTime;

use crate::sample::{Frame, Label, Metric, Sample};

pub type LocationIndex = u32;
pub type LabelIndex = u32;

/// Aggregation store accepting samples for a fixed set of value types.
///
/// `StackRecorder` keeps two of these and only ever touches one from a
/// given thread at a time, so implementations need no internal locking.
pub trait ProfileStore: Sized {
    fn new(value_types: &[Metric], start_time: SystemTime) -> Self;

    /// Merge `sample` into an existing aggregation-equivalent entry, or
    /// create a new one.
    fn add(&mut self, sample: &Sample<'_>);

    /// Empty the store (keeping its value types) and return what it held.
    fn reset(&mut self, start_time: SystemTime) -> Self;

    fn start_time(&self) -> SystemTime;

    /// Move the start of an empty store to the moment it starts accepting
    /// samples.
    fn set_start_time(&mut self, start_time: SystemTime);

    fn is_empty(&self) -> bool;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
struct SampleKey {
    stack: Vec<LocationIndex>,
    // Sorted, so label order does not affect aggregation.
    labels: Vec<LabelIndex>,
}

#[derive(Clone, Debug)]
struct Entry {
    key: SampleKey,
    values: Vec<u64>,
}

/// In-memory aggregated profile.
///
/// Frames and labels are interned; each distinct (stack, label set) pair
/// becomes one entry whose values are summed. Entries keep first-seen order.
#[derive(Clone, Debug)]
pub struct Profile {
    start_time: SystemTime,
    value_types: Vec<Metric>,
    locations: Vec<Frame>,
    location_index: HashMap<Frame, LocationIndex>,
    labels: Vec<Label>,
    label_index: HashMap<Label, LabelIndex>,
    entries: Vec<Entry>,
    entry_index: HashMap<SampleKey, usize>,
    // Reused by `add` so that merging into an existing entry does not allocate.
    scratch: SampleKey,
}

impl ProfileStore for Profile {
    fn new(value_types: &[Metric], start_time: SystemTime) -> Self {
        Profile {
            start_time,
            value_types: value_types.to_vec(),
            locations: vec![],
            location_index: HashMap::new(),
            labels: vec![],
            label_index: HashMap::new(),
            entries: vec![],
            entry_index: HashMap::new(),
            scratch: SampleKey::default(),
        }
    }

    fn add(&mut self, sample: &Sample<'_>) {
        let mut key = std::mem::take(&mut self.scratch);
        key.stack.clear();
        key.labels.clear();
        for frame in sample.frames {
            let index = self.location_index_for(frame);
            key.stack.push(index);
        }
        for label in sample.labels {
            let index = self.label_index_for(label);
            key.labels.push(index);
        }
        key.labels.sort_unstable();

        match self.entry_index.get(&key) {
            Some(&index) => {
                let entry = &mut self.entries[index];
                for (value, metric) in entry.values.iter_mut().zip(self.value_types.iter()) {
                    *value = value.saturating_add(sample.values.get(*metric));
                }
            }
            None => {
                let values = self
                    .value_types
                    .iter()
                    .map(|metric| sample.values.get(*metric))
                    .collect();
                self.entry_index.insert(key.clone(), self.entries.len());
                self.entries.push(Entry {
                    key: key.clone(),
                    values,
                });
            }
        }
        self.scratch = key;
    }

    fn reset(&mut self, start_time: SystemTime) -> Self {
        let mut fresh = Profile::new(&self.value_types, start_time);
        std::mem::swap(&mut fresh.scratch, &mut self.scratch);
        std::mem::replace(self, fresh)
    }

    fn start_time(&self) -> SystemTime {
        self.start_time
    }

    fn set_start_time(&mut self, start_time: SystemTime) {
        self.start_time = start_time;
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Profile {
    pub fn value_types(&self) -> &[Metric] {
        &self.value_types
    }

    /// Number of aggregated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Interned frames, indexed by `LocationIndex`.
    pub fn locations(&self) -> &[Frame] {
        &self.locations
    }

    pub fn samples(&self) -> impl Iterator<Item = ProfileSample<'_>> {
        self.entries.iter().map(move |entry| ProfileSample {
            profile: self,
            entry,
        })
    }

    /// Sum of `metric` over all entries. `None` when the metric is not one of
    /// this profile's value types.
    pub fn total(&self, metric: Metric) -> Option<u64> {
        let position = self.value_types.iter().position(|m| *m == metric)?;
        Some(
            self.entries
                .iter()
                .fold(0u64, |acc, e| acc.saturating_add(e.values[position])),
        )
    }

    /// Look up the entry aggregating `frames` with `labels` (in any order).
    pub fn find(&self, frames: &[Frame], labels: &[Label]) -> Option<ProfileSample<'_>> {
        let stack = frames
            .iter()
            .map(|frame| self.location_index.get(frame).copied())
            .collect::<Option<Vec<_>>>()?;
        let mut labels = labels
            .iter()
            .map(|label| self.label_index.get(label).copied())
            .collect::<Option<Vec<_>>>()?;
        labels.sort_unstable();
        let index = *self.entry_index.get(&SampleKey { stack, labels })?;
        Some(ProfileSample {
            profile: self,
            entry: &self.entries[index],
        })
    }

    /// Returns the index of the frame in `locations`, interning it if needed.
    fn location_index_for(&mut self, frame: &Frame) -> LocationIndex {
        if let Some(&index) = self.location_index.get(frame) {
            return index;
        }
        let index = self.locations.len() as LocationIndex;
        self.locations.push(frame.clone());
        self.location_index.insert(frame.clone(), index);
        index
    }

    fn label_index_for(&mut self, label: &Label) -> LabelIndex {
        if let Some(&index) = self.label_index.get(label) {
            return index;
        }
        let index = self.labels.len() as LabelIndex;
        self.labels.push(label.clone());
        self.label_index.insert(label.clone(), index);
        index
    }
}

/// Read-only view of one aggregated entry.
#[derive(Clone, Copy, Debug)]
pub struct ProfileSample<'a> {
    profile: &'a Profile,
    entry: &'a Entry,
}

impl<'a> ProfileSample<'a> {
    /// Stack of this entry, top of stack first.
    pub fn frames(&self) -> impl Iterator<Item = &'a Frame> + 'a {
        let profile = self.profile;
        self.entry
            .key
            .stack
            .iter()
            .map(move |index| &profile.locations[*index as usize])
    }

    pub fn location_indices(&self) -> &'a [LocationIndex] {
        &self.entry.key.stack
    }

    pub fn labels(&self) -> impl Iterator<Item = &'a Label> + 'a {
        let profile = self.profile;
        self.entry
            .key
            .labels
            .iter()
            .map(move |index| &profile.labels[*index as usize])
    }

    /// Values in the order of `Profile::value_types`.
    pub fn values(&self) -> &'a [u64] {
        &self.entry.values
    }

    pub fn value(&self, metric: Metric) -> Option<u64> {
        let position = self.profile.value_types.iter().position(|m| *m == metric)?;
        Some(self.entry.values[position])
    }
}

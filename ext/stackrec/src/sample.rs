use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::SampleError;

/// One entry of a captured stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    /// Function name. Empty for placeholder frames.
    pub name: String,
    pub filename: String,
    pub line: u32,
    pub is_native: bool,
}

impl Frame {
    pub fn new(name: &str, filename: &str, line: u32, is_native: bool) -> Self {
        Frame {
            name: name.to_owned(),
            filename: filename.to_owned(),
            line,
            is_native,
        }
    }

    /// Overwrite in place, reusing the existing string allocations.
    pub(crate) fn assign(&mut self, name: &str, filename: &str, line: u32, is_native: bool) {
        self.name.clear();
        self.name.push_str(name);
        self.filename.clear();
        self.filename.push_str(filename);
        self.line = line;
        self.is_native = is_native;
    }

    /// Turn this slot into a synthetic frame carrying `message` as its file name.
    pub(crate) fn assign_placeholder(&mut self, message: &str) {
        self.assign("", message, 0, false);
    }

    pub(crate) fn assign_frames_omitted(&mut self, omitted: usize) {
        self.name.clear();
        self.filename.clear();
        // Writing into a String cannot fail.
        let _ = write!(self.filename, "{} frames omitted", omitted);
        self.line = 0;
        self.is_native = false;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LabelValue {
    Str(String),
    Num(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    pub key: String,
    pub value: LabelValue,
}

impl Label {
    pub fn str(key: &str, value: &str) -> Self {
        Label {
            key: key.to_owned(),
            value: LabelValue::Str(value.to_owned()),
        }
    }

    pub fn num(key: &str, value: i64) -> Self {
        Label {
            key: key.to_owned(),
            value: LabelValue::Num(value),
        }
    }

    /// Build a label set from separate string and numeric pairs, rejecting
    /// empty or duplicated keys.
    pub fn from_pairs(
        string_labels: &[(&str, &str)],
        numeric_labels: &[(&str, i64)],
    ) -> Result<Vec<Label>, SampleError> {
        let labels: Vec<Label> = string_labels
            .iter()
            .map(|(k, v)| Label::str(k, v))
            .chain(numeric_labels.iter().map(|(k, v)| Label::num(k, *v)))
            .collect();
        validate_labels(&labels)?;
        Ok(labels)
    }
}

/// Runs on every capture and does not allocate.
pub(crate) fn validate_labels(labels: &[Label]) -> Result<(), SampleError> {
    for (i, label) in labels.iter().enumerate() {
        if label.key.is_empty() {
            return Err(SampleError::EmptyLabelKey);
        }
        if labels[..i].iter().any(|earlier| earlier.key == label.key) {
            return Err(SampleError::DuplicateLabelKey(label.key.clone()));
        }
    }
    Ok(())
}

/// Kinds of values a sample can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "cpu-time")]
    CpuTime,
    #[serde(rename = "cpu-samples")]
    CpuSamples,
    #[serde(rename = "wall-time")]
    WallTime,
    #[serde(rename = "alloc-samples")]
    AllocSamples,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::CpuTime,
        Metric::CpuSamples,
        Metric::WallTime,
        Metric::AllocSamples,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::CpuTime => "cpu-time",
            Metric::CpuSamples => "cpu-samples",
            Metric::WallTime => "wall-time",
            Metric::AllocSamples => "alloc-samples",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::CpuTime | Metric::WallTime => "nanoseconds",
            Metric::CpuSamples | Metric::AllocSamples => "count",
        }
    }
}

impl FromStr for Metric {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpu-time" => Ok(Self::CpuTime),
            "cpu-samples" => Ok(Self::CpuSamples),
            "wall-time" => Ok(Self::WallTime),
            "alloc-samples" => Ok(Self::AllocSamples),
            _ => Err(SampleError::UnknownMetric(s.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricValues {
    pub cpu_time_ns: u64,
    pub cpu_samples: u64,
    pub wall_time_ns: u64,
    pub alloc_samples: u64,
}

impl MetricValues {
    /// Parse `(metric name, value)` pairs. Metrics not mentioned are zero.
    pub fn from_pairs(pairs: &[(&str, u64)]) -> Result<Self, SampleError> {
        let mut values = MetricValues::default();
        for (name, value) in pairs {
            values.set(name.parse()?, *value);
        }
        Ok(values)
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::CpuTime => self.cpu_time_ns,
            Metric::CpuSamples => self.cpu_samples,
            Metric::WallTime => self.wall_time_ns,
            Metric::AllocSamples => self.alloc_samples,
        }
    }

    pub fn set(&mut self, metric: Metric, value: u64) {
        match metric {
            Metric::CpuTime => self.cpu_time_ns = value,
            Metric::CpuSamples => self.cpu_samples = value,
            Metric::WallTime => self.wall_time_ns = value,
            Metric::AllocSamples => self.alloc_samples = value,
        }
    }
}

/// A captured stack with its values and labels, ready to be recorded.
///
/// `frames[0]` is the top of the stack (the most recent call).
#[derive(Clone, Copy, Debug)]
pub struct Sample<'a> {
    pub frames: &'a [Frame],
    pub labels: &'a [Label],
    pub values: MetricValues,
}

impl<'a> Sample<'a> {
    pub fn new(
        frames: &'a [Frame],
        labels: &'a [Label],
        values: MetricValues,
    ) -> Result<Self, SampleError> {
        validate_labels(labels)?;
        Ok(Sample {
            frames,
            labels,
            values,
        })
    }
}

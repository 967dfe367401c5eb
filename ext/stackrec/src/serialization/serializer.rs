use std::collections::HashMap;
use std::time::UNIX_EPOCH;

use super::profile::{
    Function, FunctionImplementation, FunctionIndex, Label, Location, LocationIndex, Profile,
    Sample, ValueType,
};
use crate::sample::{Frame, LabelValue};
use crate::stack_recorder::SerializedProfile;

/// Encodes a flushed profile as JSON.
pub struct ProfileSerializer {
    profile: Profile,
    function_indices: HashMap<Function, FunctionIndex>,
    location_indices: HashMap<Location, LocationIndex>,
}

impl ProfileSerializer {
    pub fn serialize(source: &SerializedProfile) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Self::encode(source))
    }

    pub fn encode(source: &SerializedProfile) -> Profile {
        let mut serializer = ProfileSerializer {
            profile: Profile {
                start_timestamp_ns: source
                    .start
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0),
                duration_ns: source
                    .finish
                    .duration_since(source.start)
                    .map(|d| d.as_nanos())
                    .unwrap_or(0),
                value_types: source
                    .profile
                    .value_types()
                    .iter()
                    .map(|metric| ValueType {
                        type_: metric.name().to_owned(),
                        unit: metric.unit().to_owned(),
                    })
                    .collect(),
                samples: vec![],
                locations: vec![],
                functions: vec![],
            },
            function_indices: HashMap::new(),
            location_indices: HashMap::new(),
        };

        // Interned frames of the source map 1:1 to encoded locations.
        let frame_locations: Vec<LocationIndex> = source
            .profile
            .locations()
            .iter()
            .map(|frame| serializer.location_index_for(frame))
            .collect();

        for sample in source.profile.samples() {
            let stack = sample
                .location_indices()
                .iter()
                .map(|index| frame_locations[*index as usize])
                .collect();
            let labels = sample
                .labels()
                .map(|label| match &label.value {
                    LabelValue::Str(s) => Label {
                        key: label.key.clone(),
                        str: Some(s.clone()),
                        num: None,
                    },
                    LabelValue::Num(n) => Label {
                        key: label.key.clone(),
                        str: None,
                        num: Some(*n),
                    },
                })
                .collect();
            serializer.profile.samples.push(Sample {
                stack,
                labels,
                values: sample.values().to_vec(),
            });
        }

        serializer.profile
    }

    /// Returns the index of the function in `functions`, adding it if needed.
    fn function_index_for(&mut self, function: Function) -> FunctionIndex {
        if let Some(&index) = self.function_indices.get(&function) {
            return index;
        }
        let index = self.profile.functions.len();
        self.profile.functions.push(function.clone());
        self.function_indices.insert(function, index);
        index
    }

    /// Returns the index of the location in `locations`, adding it if needed.
    fn location_index_for(&mut self, frame: &Frame) -> LocationIndex {
        let function_index = self.function_index_for(Function {
            implementation: if frame.is_native {
                FunctionImplementation::Native
            } else {
                FunctionImplementation::Managed
            },
            name: frame.name.clone(),
            filename: frame.filename.clone(),
        });
        let location = Location {
            function_index,
            lineno: frame.line,
        };
        if let Some(&index) = self.location_indices.get(&location) {
            return index;
        }
        let index = self.profile.locations.len();
        self.profile.locations.push(location.clone());
        self.location_indices.insert(location, index);
        index
    }
}

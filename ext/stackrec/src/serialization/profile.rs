//! Wire shape of an encoded profile.

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Profile {
    pub start_timestamp_ns: u128,
    pub duration_ns: u128,
    pub value_types: Vec<ValueType>,
    pub samples: Vec<Sample>,
    pub locations: Vec<Location>,
    pub functions: Vec<Function>,
}

pub type LocationIndex = usize;
pub type FunctionIndex = usize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub type_: String,
    pub unit: String,
}

/// Sample
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sample {
    /// The stack leading to this sample.
    /// The leaf node will be stored at `stack[0]`.
    pub stack: Vec<LocationIndex>,
    pub labels: Vec<Label>,
    /// One value per entry of `Profile.value_types`.
    pub values: Vec<u64>,
}

/// Exactly one of `str` and `num` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num: Option<i64>,
}

/// Location represents a location (line) in the source code when a sample was captured.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub function_index: FunctionIndex,
    pub lineno: u32,
}

/// Function represents a managed method or a native function in the profile.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Function {
    pub implementation: FunctionImplementation,
    pub name: String,
    pub filename: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionImplementation {
    Managed,
    Native,
}

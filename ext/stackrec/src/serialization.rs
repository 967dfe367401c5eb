pub mod profile;
pub mod serializer;

pub use serializer::ProfileSerializer;

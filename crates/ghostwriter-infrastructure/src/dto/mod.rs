//! Persisted JSON shapes of the registry and the per-document payloads.

mod document;

pub use document::{
    RegistryDto, RegistryEntryDto, VersionHistoryDto, parse_payload, parse_registry,
    serialize_payload, serialize_registry,
};

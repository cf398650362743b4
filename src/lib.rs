//! Multi-source galaxy attribute collection.
//!
//! Fetches per-object attributes (galactic coordinates, radial velocity,
//! morphology, distance) from several external catalogs, normalizes them
//! into one canonical schema, merges per-source tables by a caller-fixed
//! priority order, and back-fills gaps in existing tables.

pub mod collect;
pub mod complete;
pub mod coords;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod schema;
pub mod source;
pub mod table;

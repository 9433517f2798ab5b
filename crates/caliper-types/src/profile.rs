//! Profiles: ordered boundaries extracted from a sketch, classified as
//! closed loops or open chains. Profiles are short-lived values and share
//! no storage with the sketch they came from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileKind {
    Closed,
    Open,
}

/// An ordered boundary in a sketch.
///
/// For a closed loop of lines and arcs, `point_ids[i]` is the point where
/// `entity_ids[i]` begins, walking counterclockwise; the two lists have
/// equal length. A lone circle is a closed profile with one entity and its
/// center as the single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub entity_ids: Vec<u32>,
    pub point_ids: Vec<u32>,
    pub kind: ProfileKind,
}

impl Profile {
    pub fn is_closed(&self) -> bool {
        self.kind == ProfileKind::Closed
    }
}

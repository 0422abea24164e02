use serde::{Deserialize, Serialize};

use super::bbox::BoundingBox;

/// A non-person object (chair, desk, ...) detected in the same frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorObject {
    pub class: String,
    pub bbox: BoundingBox,
}

/// Anchor objects of one frame, reduced to class and centroid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnchorContext {
    anchors: Vec<(String, (f64, f64))>,
}

impl AnchorContext {
    /// Objects with degenerate boxes are ignored.
    pub fn from_objects(objects: &[AnchorObject]) -> Self {
        let anchors = objects
            .iter()
            .filter(|o| o.bbox.is_valid())
            .map(|o| (o.class.clone(), o.bbox.centroid()))
            .collect();
        Self { anchors }
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Anchors within `radius` box-heights of the person's centroid, with
    /// offsets expressed in box-heights so the fingerprint is scale-free.
    pub fn fingerprint(&self, person: &BoundingBox, radius: f64) -> AnchorFingerprint {
        let (cx, cy) = person.centroid();
        let scale = person.height.max(f64::EPSILON);
        let entries = self
            .anchors
            .iter()
            .filter_map(|(class, (ax, ay))| {
                let dx = (ax - cx) / scale;
                let dy = (ay - cy) / scale;
                (dx.hypot(dy) <= radius).then(|| AnchorEntry {
                    class: class.clone(),
                    offset: (dx, dy),
                })
            })
            .collect();
        AnchorFingerprint { entries }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnchorEntry {
    pub class: String,
    pub offset: (f64, f64),
}

/// Which anchor objects surround a person, and where.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnchorFingerprint {
    entries: Vec<AnchorEntry>,
}

impl AnchorFingerprint {
    pub fn new(entries: Vec<AnchorEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[AnchorEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

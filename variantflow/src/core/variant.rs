//! Size classes and derived variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::Dimensions;
use crate::storage::{BackendKind, Location};

/// The fixed set of derivative size classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Thumbnail rendition.
    Tiny,
    /// Small rendition.
    Small,
    /// Medium rendition.
    Medium,
    /// Large rendition.
    Large,
}

impl SizeClass {
    /// All size classes, in ascending order.
    pub const ALL: [SizeClass; 4] = [Self::Tiny, Self::Small, Self::Medium, Self::Large];

    /// The bounding box a derivative of this class must fit inside.
    #[must_use]
    pub const fn bounding_box(self) -> Dimensions {
        match self {
            Self::Tiny => Dimensions::new(160, 160),
            Self::Small => Dimensions::new(320, 320),
            Self::Medium => Dimensions::new(640, 640),
            Self::Large => Dimensions::new(1280, 1280),
        }
    }

    /// Stable lowercase name, used in storage keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a variant is the untouched original or a derived rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// The uploaded payload itself.
    Original,
    /// A derived rendition of the given size class.
    Derived(SizeClass),
}

impl VariantKind {
    /// Stable name used in storage keys (`original`, `tiny`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Derived(class) => class.as_str(),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location handle was attached out of pipeline order.
#[derive(Debug, Clone, Error)]
#[error("cannot attach {attempted} location before {missing} location is set")]
pub struct LocationOrderError {
    /// The tier whose handle was being attached.
    pub attempted: BackendKind,
    /// The earlier tier whose handle is still missing.
    pub missing: BackendKind,
}

/// One stored form of an artifact.
///
/// Location handles are populated strictly in pipeline order: the
/// object-store handle is never set before the local handle, the edge
/// handle never before the object-store handle. A variant is owned by one
/// in-flight run and never shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Original or derived, and which class.
    pub kind: VariantKind,
    /// Pixel dimensions of this rendition.
    pub dimensions: Dimensions,
    /// Payload length in bytes.
    pub byte_len: u64,
    /// Whether the optimization pass succeeded for this rendition.
    pub optimized: bool,
    /// Scratch file holding the rendition while the run is in flight.
    #[serde(skip)]
    pub staged_path: Option<PathBuf>,
    local_location: Option<Location>,
    object_location: Option<Location>,
    edge_location: Option<Location>,
}

impl Variant {
    /// Creates a variant with no location handles attached.
    #[must_use]
    pub fn new(kind: VariantKind, dimensions: Dimensions, byte_len: u64) -> Self {
        Self {
            kind,
            dimensions,
            byte_len,
            optimized: false,
            staged_path: None,
            local_location: None,
            object_location: None,
            edge_location: None,
        }
    }

    /// Sets the staged scratch path.
    #[must_use]
    pub fn with_staged_path(mut self, path: PathBuf) -> Self {
        self.staged_path = Some(path);
        self
    }

    /// Marks the optimization pass as succeeded.
    pub fn mark_optimized(&mut self) {
        self.optimized = true;
    }

    /// Attaches a location handle, enforcing tier order by the handle's
    /// backend kind.
    ///
    /// # Errors
    ///
    /// Returns [`LocationOrderError`] if an earlier tier's handle is
    /// missing.
    pub fn attach(&mut self, location: Location) -> Result<(), LocationOrderError> {
        match location.backend {
            BackendKind::Durable => {
                self.local_location = Some(location);
                Ok(())
            }
            BackendKind::Object => {
                if self.local_location.is_none() {
                    return Err(LocationOrderError {
                        attempted: BackendKind::Object,
                        missing: BackendKind::Durable,
                    });
                }
                self.object_location = Some(location);
                Ok(())
            }
            BackendKind::Edge => {
                if self.object_location.is_none() {
                    return Err(LocationOrderError {
                        attempted: BackendKind::Edge,
                        missing: BackendKind::Object,
                    });
                }
                self.edge_location = Some(location);
                Ok(())
            }
        }
    }

    /// Durable-store handle, if committed.
    #[must_use]
    pub fn local_location(&self) -> Option<&Location> {
        self.local_location.as_ref()
    }

    /// Object-store handle, if committed.
    #[must_use]
    pub fn object_location(&self) -> Option<&Location> {
        self.object_location.as_ref()
    }

    /// Edge-publisher handle, if committed.
    #[must_use]
    pub fn edge_location(&self) -> Option<&Location> {
        self.edge_location.as_ref()
    }

    /// The handle for a given tier, if committed.
    #[must_use]
    pub fn location(&self, tier: BackendKind) -> Option<&Location> {
        match tier {
            BackendKind::Durable => self.local_location(),
            BackendKind::Object => self.object_location(),
            BackendKind::Edge => self.edge_location(),
        }
    }
}

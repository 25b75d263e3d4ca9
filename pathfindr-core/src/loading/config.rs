use serde::{Deserialize, Serialize};

/// Options for graph construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Create single-direction edges for ways tagged `oneway=yes`
    pub respect_oneway: bool,
    /// Fail with [`Error::PrecisionLoss`](crate::Error::PrecisionLoss) when every
    /// coordinate looks rounded to two decimals or fewer
    pub reject_rounded_coordinates: bool,
}

//! Region codes and composite-region expansion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Is2Error, Is2Result};

/// Two-letter coverage region codes.
///
/// `AA` is a composite alias: from Release 003 the Antarctic grid is tiled
/// into four quadrant sub-tiles and `AA` expands to their union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    /// Antarctica (merged composite).
    AA,
    /// Antarctica, 0° to 90°E quadrant.
    A1,
    /// Antarctica, 0° to 90°W quadrant.
    A2,
    /// Antarctica, 90°W to 180° quadrant.
    A3,
    /// Antarctica, 90°E to 180° quadrant.
    A4,
    /// Northern Canadian Archipelago.
    CN,
    /// Southern Canadian Archipelago.
    CS,
    /// Greenland.
    GL,
    /// Iceland.
    IS,
    /// Russian High Arctic.
    RA,
    /// Svalbard.
    SV,
}

/// Composite aliases and their constituent sub-tiles, in merge order.
///
/// The order here drives resolution and merge determinism: resolved granule
/// sets follow this enumeration, not catalog ordering.
const COMPOSITE_REGIONS: &[(Region, &[Region])] =
    &[(Region::AA, &[Region::A1, Region::A2, Region::A3, Region::A4])];

impl Region {
    /// All region codes, single-tile and composite.
    pub const ALL: &'static [Region] = &[
        Region::AA,
        Region::A1,
        Region::A2,
        Region::A3,
        Region::A4,
        Region::CN,
        Region::CS,
        Region::GL,
        Region::IS,
        Region::RA,
        Region::SV,
    ];

    /// Parse a two-letter region code.
    pub fn parse(s: &str) -> Is2Result<Self> {
        match s {
            "AA" => Ok(Self::AA),
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "A3" => Ok(Self::A3),
            "A4" => Ok(Self::A4),
            "CN" => Ok(Self::CN),
            "CS" => Ok(Self::CS),
            "GL" => Ok(Self::GL),
            "IS" => Ok(Self::IS),
            "RA" => Ok(Self::RA),
            "SV" => Ok(Self::SV),
            other => Err(Is2Error::invalid_query(format!("unknown region: {other}"))),
        }
    }

    /// The two-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AA => "AA",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::CN => "CN",
            Self::CS => "CS",
            Self::GL => "GL",
            Self::IS => "IS",
            Self::RA => "RA",
            Self::SV => "SV",
        }
    }

    /// Whether this code is a composite alias.
    pub fn is_composite(&self) -> bool {
        COMPOSITE_REGIONS.iter().any(|(alias, _)| alias == self)
    }

    /// The sub-tiles this region resolves to, in enumeration order.
    ///
    /// Single-tile regions resolve to themselves.
    pub fn subtiles(&self) -> Vec<Region> {
        COMPOSITE_REGIONS
            .iter()
            .find(|(alias, _)| alias == self)
            .map(|(_, tiles)| tiles.to_vec())
            .unwrap_or_else(|| vec![*self])
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Verify the composite table at startup: every alias must expand to at
/// least two known, non-composite sub-tiles with no duplicates.
pub fn composite_table_is_complete() -> Is2Result<()> {
    for (alias, tiles) in COMPOSITE_REGIONS {
        if tiles.len() < 2 {
            return Err(Is2Error::metadata(format!(
                "composite region {alias} expands to fewer than two sub-tiles"
            )));
        }
        for tile in *tiles {
            if tile.is_composite() {
                return Err(Is2Error::metadata(format!(
                    "composite region {alias} contains nested composite {tile}"
                )));
            }
        }
        let mut seen = tiles.to_vec();
        seen.sort();
        seen.dedup();
        if seen.len() != tiles.len() {
            return Err(Is2Error::metadata(format!(
                "composite region {alias} lists duplicate sub-tiles"
            )));
        }
    }
    Ok(())
}

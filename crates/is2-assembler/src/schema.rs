//! Granule store schemas.
//!
//! The height model uses a flat layout: coordinate and data arrays live at
//! the store root. The height-change model is grouped: each lag group
//! (`delta_h`, `dhdt_lag1`, ...) carries its own coordinate arrays and time
//! axis, because a lagged rate series has fewer epochs than the quarterly
//! height-change series it is derived from. The schema table below is keyed
//! by product and release so layout changes between releases stay data, not
//! code.

use is2_common::{Is2Error, Is2Result, Product, Release};

/// Days in one repeat-cycle quarter of the product year.
pub const QUARTER_DAYS: f64 = 365.25 / 4.0;

/// How arrays are arranged inside a granule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Coordinate and data arrays at the store root, no time axis.
    Flat,
    /// Per-group subtrees, each with its own coordinates and time axis.
    Grouped,
}

/// One variable group within a granule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupDescriptor {
    /// Group name, also the subtree prefix (empty for the flat layout).
    pub name: &'static str,
    /// Main data variable.
    pub primary: &'static str,
    /// One-sigma uncertainty companion of the primary variable.
    pub sigma: &'static str,
    /// Area variables usable as extraction weights, in preference order.
    pub area: &'static [&'static str],
    /// Lag length in quarters (0 for the undifferenced series).
    pub lag_quarters: u32,
}

impl GroupDescriptor {
    /// Midpoint offset of this group's time values, in days. Lagged rates
    /// are timestamped at the center of their differencing window.
    pub fn midpoint_offset_days(&self) -> f64 {
        f64::from(self.lag_quarters) * QUARTER_DAYS / 2.0
    }

    /// Variables read by default for this group.
    pub fn default_variables(&self) -> Vec<String> {
        let mut names = vec![self.primary.to_string(), self.sigma.to_string()];
        names.extend(self.area.iter().map(|s| s.to_string()));
        names
    }
}

/// The layout of one product release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub layout: Layout,
    pub groups: &'static [GroupDescriptor],
    /// Variable names holding one-sigma uncertainties or fit residuals;
    /// extraction aggregates these in quadrature rather than linearly.
    pub uncertainty_variables: &'static [&'static str],
}

impl SchemaDescriptor {
    /// Look up a group by name. The flat layout has a single unnamed group.
    pub fn group(&self, name: Option<&str>) -> Is2Result<&'static GroupDescriptor> {
        match (self.layout, name) {
            (Layout::Flat, None) => Ok(&self.groups[0]),
            (Layout::Flat, Some(name)) => Err(Is2Error::invalid_query(format!(
                "flat granule stores have no groups (requested {name})"
            ))),
            (Layout::Grouped, None) => Ok(&self.groups[0]),
            (Layout::Grouped, Some(name)) => self
                .groups
                .iter()
                .find(|g| g.name == name)
                .ok_or_else(|| {
                    Is2Error::invalid_query(format!("unknown group: {name}"))
                }),
        }
    }

    /// Whether a variable carries uncertainties.
    pub fn is_uncertainty(&self, variable: &str) -> bool {
        self.uncertainty_variables.contains(&variable)
    }
}

const HEIGHT_MODEL_GROUPS: &[GroupDescriptor] = &[GroupDescriptor {
    name: "",
    primary: "h",
    sigma: "h_sigma",
    area: &["cell_area"],
    lag_quarters: 0,
}];

const DELTA_H: GroupDescriptor = GroupDescriptor {
    name: "delta_h",
    primary: "delta_h",
    sigma: "delta_h_sigma",
    area: &["ice_area", "cell_area"],
    lag_quarters: 0,
};

const DHDT_LAG1: GroupDescriptor = GroupDescriptor {
    name: "dhdt_lag1",
    primary: "dhdt",
    sigma: "dhdt_sigma",
    area: &["ice_area"],
    lag_quarters: 1,
};

const DHDT_LAG4: GroupDescriptor = GroupDescriptor {
    name: "dhdt_lag4",
    primary: "dhdt",
    sigma: "dhdt_sigma",
    area: &["ice_area"],
    lag_quarters: 4,
};

const DHDT_LAG8: GroupDescriptor = GroupDescriptor {
    name: "dhdt_lag8",
    primary: "dhdt",
    sigma: "dhdt_sigma",
    area: &["ice_area"],
    lag_quarters: 8,
};

/// Uncertainty and misfit variables, both layouts.
const UNCERTAINTY_VARIABLES: &[&str] = &[
    "h_sigma",
    "delta_h_sigma",
    "dhdt_sigma",
    "misfit_rms",
    "misfit_rms_scaled",
];

const HEIGHT_MODEL_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    layout: Layout::Flat,
    groups: HEIGHT_MODEL_GROUPS,
    uncertainty_variables: UNCERTAINTY_VARIABLES,
};

const HEIGHT_CHANGE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    layout: Layout::Grouped,
    groups: &[DELTA_H, DHDT_LAG1, DHDT_LAG4, DHDT_LAG8],
    uncertainty_variables: UNCERTAINTY_VARIABLES,
};

/// The first release whose height-change stores carry the eight-quarter
/// lag group.
const FIRST_LAG8_RELEASE: u16 = 2;

const EARLY_HEIGHT_CHANGE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    layout: Layout::Grouped,
    groups: &[DELTA_H, DHDT_LAG1, DHDT_LAG4],
    uncertainty_variables: UNCERTAINTY_VARIABLES,
};

/// The schema for a product release.
pub fn descriptor_for(product: Product, release: &Release) -> &'static SchemaDescriptor {
    match product {
        Product::Atl14 => &HEIGHT_MODEL_SCHEMA,
        Product::Atl15 if release.number() < FIRST_LAG8_RELEASE => &EARLY_HEIGHT_CHANGE_SCHEMA,
        Product::Atl15 => &HEIGHT_CHANGE_SCHEMA,
    }
}

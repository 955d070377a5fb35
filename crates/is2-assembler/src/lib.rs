//! Dataset assembly over Zarr granule stores.
//!
//! Resolved granules are opened against their storage backend, checked for
//! grid compatibility, and merged onto a union grid with a last-listed-wins
//! overwrite policy. Variable data stays lazy: the assembled dataset holds
//! open array handles and offsets, and materializes a variable only when
//! asked to resolve it.

pub mod dataset;
pub mod granule;
pub mod merge;
pub mod schema;
pub mod store;
pub mod writer;

pub use dataset::{
    assemble, AssembleOptions, AssembledDataset, GridWindow, VariableCube, VariableMeta,
};
pub use granule::OpenGranule;
pub use schema::{GroupDescriptor, Layout, SchemaDescriptor};
pub use store::CloudStoreConfig;
pub use writer::{write_granule, GranuleStoreSpec, GroupData, VariableData};

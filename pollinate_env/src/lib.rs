//! Pollination Baseline Boundary
//!
//! This crate is the edge between the scenario engine and wherever the
//! baseline landscape lives. The engine never parses files itself: it asks
//! a [`BaselineSource`] for named layers and assembles its immutable feature
//! store from them.
//!
//! Layers may arrive faceted (service levels, pesticide rates and crop
//! locations as three layers) or as one merged layer; both are just
//! [`BaselineLayer`]s here.
//!
//! # Example
//!
//! ```ignore
//! use pollinate_env::{BaselineSource, JsonPackageSource};
//!
//! let source = JsonPackageSource::open("data/landscape.json")?;
//! let services = source.load_layer("baseServices")?;
//! ```

mod error;
mod json_package;
mod memory;
mod source;
mod types;

pub use error::LoadError;
pub use json_package::{load_baseline, JsonPackageSource};
pub use memory::MemorySource;
pub use source::BaselineSource;
pub use types::{BaselineLayer, LayerFeature, LayerPackage};

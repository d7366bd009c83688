//! Release discovery: the asset model, platform matching and the sources
//! that publish releases.

pub mod asset;
pub mod github;
pub mod oci;
pub mod platform;
pub mod selection;
pub mod source;

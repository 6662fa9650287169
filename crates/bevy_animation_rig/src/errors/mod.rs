mod asset_loader_error;
mod bake_error;

pub use asset_loader_error::*;
pub use bake_error::*;

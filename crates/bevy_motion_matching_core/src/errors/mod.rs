mod asset_loader_error;
mod motion_matching_error;

pub use asset_loader_error::*;
pub use motion_matching_error::*;

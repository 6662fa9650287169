mod bind_error;
mod weighted_set_error;

pub use bind_error::*;
pub use weighted_set_error::*;

pub mod load;
pub mod types;

pub use load::{expand_path, load};
pub use types::*;

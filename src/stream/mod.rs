//! Stream combinators

mod paced;

pub use paced::{PaceExt, Paced};

pub mod generation;
pub mod stripe;

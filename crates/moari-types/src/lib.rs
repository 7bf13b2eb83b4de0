pub mod api;
pub mod models;
pub mod moment;

pub use moment::Moment;

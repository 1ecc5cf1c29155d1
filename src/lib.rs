pub use error::Error;

pub mod area;
pub mod conf;
mod error;
pub mod geofence;
pub mod log;
pub mod marker;
pub mod scheduler;
pub mod settings;
pub mod viewport;


pub type Result<T, E = Error> = std::result::Result<T, E>;

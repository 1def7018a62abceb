pub mod config_manager;
pub mod error;
pub mod ids;
pub mod traits;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use ids::*;
pub use traits::*;
pub use types::*;

pub mod commands;
pub mod dispatch;
pub mod io;
pub mod store;

pub use commands::*;
pub use dispatch::*;
pub use io::*;
pub use store::*;

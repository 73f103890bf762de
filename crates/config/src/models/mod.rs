pub mod app_config;
pub mod logging;
pub mod pool;
pub mod run;
pub mod stages;

pub use app_config::*;
pub use logging::*;
pub use pool::*;
pub use run::*;
pub use stages::*;

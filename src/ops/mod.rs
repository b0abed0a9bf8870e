pub mod error;
pub mod install;
pub mod remove;
pub mod update;

pub use error::OpError;
pub use install::install;
pub use remove::uninstall;
pub use update::{update, UpdateReport};

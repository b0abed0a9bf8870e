pub mod package;

pub use package::PackageName;

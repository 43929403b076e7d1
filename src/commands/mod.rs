//! CLI commands implementation

pub mod check;
pub mod init;
pub mod run;
pub mod status;

pub use check::*;
pub use init::*;
pub use run::*;
pub use status::*;

pub mod launch;
pub mod update;

pub use launch::launch_program;
pub use update::{check, install, watch_status};

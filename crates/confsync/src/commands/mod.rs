//! Command handlers, one module per subcommand.

pub mod completion;
pub mod init;
pub mod materialize;
pub mod read;
pub mod status;
pub mod sync_all;
pub mod sync_dir;
pub mod write;

pub mod auto;
pub mod init;
pub mod snapshot;

pub mod init;
pub mod kill;
pub mod status;

pub mod init;
pub mod terminate;

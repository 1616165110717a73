pub mod deps;
pub mod estimate;
pub mod init;
pub mod projects;
pub mod whoami;

pub mod checksum;
pub mod file_id;
pub mod fs;
pub mod process;

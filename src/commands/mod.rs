pub mod config;
pub mod doctor;
pub mod documents;
pub mod interactive;
pub mod status;
pub mod terraform;

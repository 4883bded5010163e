pub mod describe;
pub mod resolve;
pub mod version;

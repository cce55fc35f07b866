pub mod eth;
pub mod helper;
pub mod network;
pub mod payload;

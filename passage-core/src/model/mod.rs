pub mod mode;
pub mod network;
pub mod request;
pub mod state;
pub mod traversal;

pub mod protocol;
pub mod transport;
pub mod ws_transport;

pub mod controller;
pub mod net_client;
pub mod room_state;
pub mod session;

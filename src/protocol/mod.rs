pub mod command;
pub mod packet;
pub mod primitive;
pub mod response;

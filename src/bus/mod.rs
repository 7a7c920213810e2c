pub mod main_bus;
pub mod message_bus;
pub mod picture_bus;

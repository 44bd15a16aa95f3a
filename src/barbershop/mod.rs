pub mod barber;
pub mod constants;
pub mod customer;
pub mod handler;
pub mod shop;

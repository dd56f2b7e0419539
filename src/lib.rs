pub mod api;
pub mod app;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod gateway;
pub mod mongo_ext;
pub mod util;

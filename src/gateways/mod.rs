pub mod error;
pub mod gateway;
pub mod momo;
pub mod registry;
pub mod signing;
pub mod types;
pub mod vnpay;
pub mod zalopay;

pub mod core;
pub mod p5;

pub mod config;
pub mod db;
pub mod ipc;
pub mod p5;

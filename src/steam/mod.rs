pub mod client;
pub mod models;
pub mod openid;

pub use client::SteamClient;

pub mod auth;
pub mod lookup;
pub mod pagination;
pub mod rate_limit;
pub mod session;

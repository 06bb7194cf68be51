pub mod jwt;
pub mod public_token;
pub mod rate_limit;

pub mod hashing;
pub mod jwt;

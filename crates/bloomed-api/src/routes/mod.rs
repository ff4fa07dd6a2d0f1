pub mod docs;
pub mod dream;
pub mod health;
pub mod journal;

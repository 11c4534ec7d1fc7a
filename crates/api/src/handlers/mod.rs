pub mod habits;
pub mod health;

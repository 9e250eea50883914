pub mod chat;
pub mod generator;
pub mod openai;
pub mod state;

pub mod media;
pub mod openai;
pub mod payment;
pub mod security;
pub mod storage;

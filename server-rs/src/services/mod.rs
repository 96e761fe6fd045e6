pub mod openai;
pub mod quota;
pub mod shopify;
pub mod subscription_sync;
pub mod whatsapp;

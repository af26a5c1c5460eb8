pub mod client;
pub mod errors;
pub mod identity;

pub use client::OllamaClient;
pub use errors::InferenceError;
pub use identity::IdentityProfile;

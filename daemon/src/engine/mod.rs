pub mod normalizer;
pub mod notifications;
pub mod session;
pub mod verifier;

//! Patient context adapters.

mod static_provider;

pub use static_provider::StaticPatientContextProvider;

//! Consultation archive adapters.

mod postgres;

pub use postgres::PostgresConsultationArchive;

//! MedQA Relay - real-time patient/doctor consultation relay
//!
//! Patients ask questions over a WebSocket, an AI service drafts an answer,
//! and a doctor approves, edits or rejects the draft before anything reaches
//! the patient.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

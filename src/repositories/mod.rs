pub mod account;
pub mod doctor;
#[cfg(test)]
pub mod memory;
pub mod patient;

pub use account::{AccountRepository, CredentialStore};
pub use doctor::DoctorRepository;
pub use patient::PatientRepository;

pub mod account;
pub mod doctor;
pub mod patient;

pub use account::Account;
pub use doctor::{Doctor, DoctorInput};
pub use patient::{Patient, PatientInput};

pub mod doctors;
pub mod extract;
pub mod health;
pub mod login;
pub mod password_reset;
pub mod patients;

pub use doctors::{create_doctor, delete_doctor, get_doctor, list_doctors, update_doctor};
pub use health::health_check;
pub use login::login;
pub use password_reset::{forgot_password, reset_password};
pub use patients::{create_patient, delete_patient, get_patient, list_patients, update_patient};

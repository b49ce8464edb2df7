pub mod admission;
pub mod console;
pub mod credentials;
pub mod lifecycle;
pub mod notification;
pub mod payment;
pub mod portal;
pub mod telemedicine;

pub use admission::{validate_booking, AdmissionService};
pub use console::ConsoleService;
pub use credentials::CredentialHasher;
pub use lifecycle::LifecycleService;
pub use notification::{dispatch, notifier_from_config, LogNotifier, Notifier, PatientMessage, ResendNotifier};
pub use payment::PaymentService;
pub use portal::PatientPortal;
pub use telemedicine::TelemedicineProvider;

pub mod conflict;
pub mod history;
pub mod lifecycle;
pub mod locks;

pub use conflict::ConflictValidator;
pub use history::PatientAppointmentService;
pub use lifecycle::AppointmentLifecycleManager;
pub use locks::DoctorLocks;

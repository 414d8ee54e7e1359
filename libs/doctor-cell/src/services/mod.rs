pub mod availability;

pub use availability::AvailabilityCalculator;

//! Repository implementations for all persisted entities

pub mod port_reservation;
pub mod project;

#[cfg(test)]
mod port_reservation_tests;

pub use port_reservation::{PortReservationRepository, PORT_NUMBER_COLUMN};
pub use project::ProjectRepository;

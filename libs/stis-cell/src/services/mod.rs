pub mod assembler;
pub mod booking;
pub mod capacity;
pub mod catalog;
pub mod feedback;
pub mod result;

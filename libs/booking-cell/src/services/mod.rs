pub mod assembler;
pub mod booking;
pub mod conflict;
pub mod directory;
pub mod feedback;
pub mod history;
pub mod lifecycle;
pub mod timing;

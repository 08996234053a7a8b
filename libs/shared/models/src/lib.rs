pub mod auth;
pub mod error;
pub mod page;
pub mod response;

pub use auth::{Role, User};
pub use error::AppError;
pub use page::{Page, PageRequest, SortDirection};
pub use response::ApiResponse;

pub mod http_api;
pub mod session;

pub use http_api::{Endpoints, HttpStudyApi};
pub use session::{StaticSession, SupabaseSession};

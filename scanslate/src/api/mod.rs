mod handlers;
mod middleware;
mod openapi;
mod routes;
mod state;

pub use handlers::upload::UploadResponse;
pub use middleware::client_key;
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;

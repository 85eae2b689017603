pub mod route;

pub use route::router;

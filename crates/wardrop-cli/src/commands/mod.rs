pub mod price;
pub mod routes;
pub mod validate;

pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;
pub mod wishlists;

pub use carts::carts_routes;
pub use checkout::checkout_routes;
pub use orders::orders_routes;
pub use products::products_routes;
pub use wishlists::wishlists_routes;

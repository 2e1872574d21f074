//! Aggregates module
pub mod book;
pub mod catalog;
pub mod order;
pub mod cart;
pub mod review;

pub use book::{Book, BookDetails, BookError, BookStatus};
pub use catalog::{slugify, Author, Category};
pub use order::{LineItem, Order, OrderError, OrderStatus, PaymentMethod, PaymentStatus, Recipient};
pub use cart::{Cart, CartError, CartItem};
pub use review::{average_rating, Review, ReviewError, ReviewStatus};

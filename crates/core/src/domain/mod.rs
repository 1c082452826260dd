pub mod feed;
pub mod rating;

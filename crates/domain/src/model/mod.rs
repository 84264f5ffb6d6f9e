//! Batches, order lines and the product aggregate.

mod batch;
mod order_line;
mod product;

pub use batch::Batch;
pub use order_line::OrderLine;
pub use product::Product;

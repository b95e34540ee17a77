pub mod category;
pub mod order;
pub mod order_item;
pub mod order_number_sequence;
pub mod payment;
pub mod product;
pub mod product_customization;
pub mod user;

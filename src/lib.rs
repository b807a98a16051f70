pub mod expression;
pub mod tool;

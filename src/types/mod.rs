pub mod ids;
pub mod price;
pub mod price_point;
pub mod symbol;

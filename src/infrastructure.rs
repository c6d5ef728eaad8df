pub mod memory;
pub mod soap;

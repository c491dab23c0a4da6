pub mod inbox_use_case;
pub mod ports;

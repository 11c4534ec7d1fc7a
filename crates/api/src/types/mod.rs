pub mod update_value;

pub use update_value::UpdateValue;

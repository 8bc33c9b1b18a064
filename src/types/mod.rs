pub mod geo_point;
pub mod observation;
pub mod variable;

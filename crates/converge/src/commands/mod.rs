pub mod check_schema;
pub mod limits;
pub mod plan;

pub mod agents;
pub mod function;
pub mod tools;

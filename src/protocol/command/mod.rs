mod field;
pub mod prepared;


pub use field::FieldDefinition;
pub use field::FieldDefinitionTail;

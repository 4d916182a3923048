/// The read-only view of a checked module the generator works against.
pub mod environment;
/// Operators of the expression language and their printed forms.
pub mod ops;
/// Proof obligation generation.
pub mod pog;
pub mod printer;
pub mod srcloc;
/// The type checked tree the generator walks.
pub mod typedtree;
pub mod types;

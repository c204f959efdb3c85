// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that describe what the system
// works with, independent of Burn and of the filesystem.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// An aligned source/target sentence pair
pub mod sentence_pair;

// Core abstractions (traits) that other layers implement
pub mod traits;

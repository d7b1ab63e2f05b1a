// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system
// works with: labeled text samples, the classification
// problem type, and the abstractions other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Keeping it framework-free means the splitter, the metric
// maths and the label decoding can be unit tested without
// a tensor backend.

// Labeled / indexed text samples
pub mod sample;

// Multi-label vs single-label problem type
pub mod problem;

// Core abstractions (traits) that other layers implement
pub mod traits;

//! Wire and row types.
//!
//! Row structs derive `FromRow` and map one-to-one onto the tables in `migrations/`.
//! Request payloads are the `*Request` structs; `New*` structs are the validated,
//! server-computed inputs handed to the repository.

pub mod audio;
pub mod batch;
pub mod evaluation;
pub mod organization;
pub mod quiz;

pub use audio::*;
pub use batch::*;
pub use evaluation::*;
pub use organization::*;
pub use quiz::*;

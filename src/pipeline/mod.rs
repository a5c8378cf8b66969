//! Request lifecycle stages.
//!
//! Each submodule implements exactly one step of a watermark request, so
//! each can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ transform ──▶ respond
//! (multipart)  (child proc)  (stream PDF)
//!       ╲          │          ╱
//!        ╰──── scratch files ╯   deleted on every path
//! ```
//!
//! 1. [`intake`]    — stream the single `file` part into a scratch file
//! 2. [`transform`] — run the external watermark script and capture its output
//! 3. [`respond`]   — stream the result back and delete it afterwards
//! 4. [`scratch`]   — uniquely named files that delete themselves on drop

pub mod intake;
pub mod respond;
pub mod scratch;
pub mod transform;

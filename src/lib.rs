//! # pdf-watermark-api
//!
//! An HTTP service that stamps uploaded PDFs through an external watermarking
//! tool and streams the result back.
//!
//! The watermark itself is drawn by a script (PyMuPDF in the stock setup)
//! that this crate treats as a black box: it is given an input path, an
//! output path and a JSON options record, and either exits 0 having written
//! the output or exits non-zero with diagnostics on stderr. What this crate
//! owns is the request lifecycle around it, and in particular the guarantee
//! that no scratch file outlives its request, whatever the outcome.
//!
//! ## Request Lifecycle
//!
//! ```text
//! POST /watermark/{operation}
//!  │
//!  ├─ 1. Resolve   look up the operation (script + server-side options)
//!  ├─ 2. Intake    stream the multipart `file` part into a scratch file
//!  ├─ 3. Transform run `<python> <script> --input … --output … --options …`
//!  ├─ 4. Cleanup   delete the upload; on failure delete the output too
//!  └─ 5. Respond   stream the PDF, deleting it once the body is done
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_watermark_api::{router, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(3200).build()?;
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, router(config)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-watermark-api` binary (clap + anyhow + tracing-subscriber + dotenv) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod operation;
pub mod pipeline;
pub mod server;
pub mod watermark;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::WatermarkError;
pub use operation::{OperationRegistry, OperationSpec, WatermarkOptions};
pub use pipeline::transform::{ProcessResult, Termination, Transformer};
pub use server::{router, AppState};
pub use watermark::watermark;

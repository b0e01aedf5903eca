//! # dfd - Datasheets for Datasets
//!
//! dfd documents tabular datasets following the questionnaire of
//! ["Datasheets for Datasets"](https://arxiv.org/abs/1803.09010). It computes
//! per-column statistics on an Arrow or DataFusion engine and merges them
//! into a markdown datasheet that people fill in by hand.
//!
//! ## Quick Start
//!
//! ```rust
//! use dfd_core::prelude::*;
//! use dfd_core::test_fixtures::people_table;
//!
//! # fn example() -> dfd_core::error::Result<()> {
//! let config = DatasheetConfig::new("People").with_backend(BackendKind::Arrow);
//! let output = build_datasheet(&config, DataSource::arrow(people_table()), None)?;
//!
//! assert!(output.document.contains("### Numeric Summary"));
//! for stats in &output.analysis.statistics {
//!     println!("{}: {} ({} missing)", stats.column_name, stats.dtype, stats.missing_count);
//! }
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Workflow
//!
//! 1. Generate a blank template with [`pipeline::generate_template`].
//! 2. Answer the questions in any editor.
//! 3. Compile the template against the data with [`pipeline::build_datasheet`].
//!    Sections carrying `<!-- dfd:automated -->` are rewritten from fresh
//!    statistics; everything else is kept as written, so step 3 can be
//!    repeated whenever the data changes.
//!
//! ## Architecture
//!
//! - **`backends`**: engine adapters ([`backends::ArrowBackend`],
//!   [`backends::DataFusionBackend`]) behind the [`backends::Backend`] trait,
//!   plus engine resolution
//! - **`analyzers`**: type classification and the tabular analysis engine
//! - **`template`**: questionnaire schemas, markdown parsing, rendering and
//!   compilation
//! - **`pipeline`**: one-call entry points tying the above together
//! - **`config`**: serializable pipeline settings
//! - **`logging`**: `tracing` subscriber setup for binaries
//!
//! ## Features
//!
//! - `arrow-backend` (default): the Arrow engine
//! - `datafusion-backend` (default): the DataFusion engine
//! - `test-utils`: the [`test_fixtures`] module

pub mod analyzers;
pub mod backends;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod security;
pub mod template;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

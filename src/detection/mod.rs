//! Per-domain detection.
//!
//! A [`DetectionPipeline`] runs an ordered list of [`DetectionStage`]s over a
//! [`PipelineContext`]. Stages are sorted by ascending priority:
//!
//! | stage | priority | stops the run on |
//! |---|---|---|
//! | blocked | 10 | block-list match |
//! | location | 20 | DNS failure, domestic server |
//! | network | 30 | unreachable, excluded status code |
//! | tls | 40 | handshake failure, missing TLS 1.3 / X25519 / HTTP/2 |
//! | sni | 50 | certificate does not cover the domain |
//! | certificate | 60 | untrusted, expired or unparseable certificate |
//! | cdn | 70 | never (last stage) |

mod context;
mod pipeline;
mod stage;
pub mod stages;

pub use context::{normalize_domain, PipelineContext};
pub use pipeline::DetectionPipeline;
pub use stage::DetectionStage;

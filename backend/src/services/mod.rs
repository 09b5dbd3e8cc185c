//! Report pipeline services

pub mod animation;
pub mod charts;
pub mod composer;
pub mod coordinator;
pub mod mock;
pub mod narrative;
pub mod normalizer;
pub mod report;

pub use animation::{AnimationBuilder, DisabledAnimation, SunAnimator};
pub use composer::ReportComposer;
pub use coordinator::{FetchCoordinator, FetchOutcome, SourceFailure};
pub use mock::{load_mock_bundle, MockBundle};
pub use narrative::{LlmNarrator, NarrativeGenerator, NarrativeOutput};
pub use normalizer::normalize;
pub use report::{GeneratedReport, ReportService, ReportSource};

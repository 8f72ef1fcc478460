//! Agents: narrow-capability components sharing one browser session.
//!
//! Each agent receives its collaborators explicitly (activity log, session
//! control, pacing, provider traits); none of them hold a reference back to
//! the controller.

pub mod credentials;
pub mod cv_parser;
pub mod form_filler;
pub mod linkedin;
pub mod navigator;
pub mod profile;

pub use credentials::CredentialsAgent;
pub use cv_parser::{CvData, CvEnricher, CvParserAgent, DocumentTextExtractor, PlainTextExtractor};
pub use form_filler::{EasyApplyOutcome, FieldKind, FieldMapping, FormFillerAgent};
pub use linkedin::{ApplicationStatus, JobPosting, LinkedInAgent, RecoveryKind};
pub use navigator::NavigationAgent;
pub use profile::{JobPreferences, ProfileBackend, UserProfile, UserProfileStore, WorkMode};

pub mod language;
pub mod question;
pub mod submission;

pub use language::{InputMode, Language, Script};
pub use question::{GeneratedQuestion, NewQuestion, Question};
pub use submission::{ContributionDraft, LedgerRow, Submission, ANONYMOUS_USER};

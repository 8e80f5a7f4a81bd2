//! Presentation layer: form fields and their rules, one form per feature,
//! request-local submission state, failure notifications and result cards.

mod card;
mod feature;
mod field;
mod notify;
mod session;
mod upload;

pub use card::{CardSection, Emphasis, ResultCard};
pub use feature::{
    AdvisoryForm, ConservationPlanner, CropDoctor, EntrepreneurshipSupport, FinancialAdvisory,
    FormId, MarketPrices, MAX_IMAGE_BYTES,
};
pub use field::{validate, FieldDef, FieldError, FieldErrors, FieldKind, RawForm, RawValue, Rule, ValidatedForm};
pub use notify::{Notification, NotificationLog, Notifier, TracingNotifier};
pub use session::{FormSession, Outcome, Phase, SubmitError, Submission};
pub use upload::{guess_content_type, Upload};

pub mod coach;
pub mod error;
pub mod models;
pub mod profile;
pub mod progress;
pub mod store;

pub use coach::{CoachFilter, ConsultationLog, ConsultationRequest};
pub use error::{CacheError, ClientError, ProfileError, Result};
pub use models::PayloadView;
pub use profile::{Profile, ProfileForm, StoredProfile};
pub use progress::{WeightEntry, WeightLog};
pub use store::{write_atomic, CacheLookup, CachedResult, ResultCache};

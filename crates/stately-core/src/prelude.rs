pub use crate::error::{ListenerErrors, ListenerFailure, StateError};
pub use crate::identity::Identical;
pub use crate::listeners::RemoveListener;
pub use crate::notifier::{Lifecycle, StateListenable, StateNotifier};
pub use crate::sink::{report_error, set_default_error_sink, with_error_sink};
#[cfg(feature = "stream")]
pub use crate::stream::StateStream;

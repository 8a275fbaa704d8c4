//! Core of the associative selection engine
//!
//! Given fields, their distinct values and the records that associate them,
//! this crate tracks user selections and derives every value's state
//! (selected, possible, alternative, excluded, selected-excluded) the way a
//! listbox or filter pane shows it.

pub mod error;
pub mod events;
pub mod index;
pub mod model;
pub mod resolver;
pub mod selection;
pub mod session;

// Re-export commonly used types
pub use error::{IndexError, SelectionError};
pub use events::{ChangeNotifier, FieldChanged, SelectionSubscriber, SessionId, SubscriptionId};
pub use index::{AssociationIndex, Candidates, IndexBuilder, ValueMask};
pub use model::{Field, FieldId, RecordId, State, Value, ValueId};
pub use resolver::{ListboxSort, ResolvedField, ResolvedValue, Resolver, ResolverSettings, StateCounts};
pub use selection::{SelectMode, SelectionDelta, SelectionSet};
pub use session::{CurrentSelection, Session, SessionSettings, SessionSnapshot};
pub use data::DataLoader;

pub mod data {
    use crate::index::AssociationIndex;

    /// Source of the records an index is built from
    #[async_trait::async_trait]
    pub trait DataLoader: Send + Sync {
        /// Read the source and build an index over it
        async fn load(&self) -> anyhow::Result<AssociationIndex>;

        /// Get the source name/path
        fn source_name(&self) -> &str;
    }
}

//! corens-registration: Name availability and registration
//!
//! [`RegistrationWorkflow`] is the state machine behind the search box: it
//! normalizes input, checks the Registry, and submits and confirms a paid
//! registration. [`lookup_domain`] serves the read-only details view.

pub mod confirm;
pub mod lookup;
pub mod settings;
pub mod state;
pub mod workflow;

pub use lookup::{lookup_domain, DomainInfo};
pub use settings::RegistrationSettings;
pub use state::{WorkflowSnapshot, WorkflowState};
pub use workflow::{RegistrationWorkflow, WorkflowEvent};

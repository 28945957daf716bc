use crate::{Error, ServiceDescriptor};

/// Overall reconciliation state of the service list.
///
/// `Refreshing` and `Loaded` always carry a decoded list; `Error` carries none.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum ServicesState {
    #[default]
    Idle,
    /// First load, nothing to show yet.
    Loading,
    /// Reloading while the stale list stays visible.
    Refreshing(Vec<ServiceDescriptor>),
    Loaded(Vec<ServiceDescriptor>),
    Error(Error),
}

impl ServicesState {
    /// The visible list, if any.
    pub fn services(&self) -> Option<&[ServiceDescriptor]> {
        match self {
            ServicesState::Refreshing(list) | ServicesState::Loaded(list) => Some(list),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, ServicesState::Loading | ServicesState::Refreshing(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ServicesState::Error(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn services_mut(&mut self) -> Option<&mut Vec<ServiceDescriptor>> {
        match self {
            ServicesState::Refreshing(list) | ServicesState::Loaded(list) => Some(list),
            _ => None,
        }
    }
}

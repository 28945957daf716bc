use std::fmt;

/// Execution context for brew service commands.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ServiceDomain {
    /// Services run as the current user (`~/Library/LaunchAgents`). No elevation.
    #[default]
    User,
    /// Services run as root (`/Library/LaunchDaemons`). Commands go through the administrator
    /// prompt.
    System,
}

impl ServiceDomain {
    /// Every domain, user first.
    pub const ALL: [ServiceDomain; 2] = [ServiceDomain::User, ServiceDomain::System];

    /// Stable identifier (`user` / `system`), also used in cache file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceDomain::User => "user",
            ServiceDomain::System => "system",
        }
    }

    /// Human-readable name for menus and headings.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceDomain::User => "User",
            ServiceDomain::System => "System",
        }
    }

    pub fn requires_elevation(&self) -> bool {
        matches!(self, ServiceDomain::System)
    }
}

impl fmt::Display for ServiceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "TCP",
            PortProtocol::Udp => "UDP",
        }
    }
}

/// A socket a service process (or one of its descendants) is listening on.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct ListeningPort {
    pub port: u16,
    pub protocol: PortProtocol,
}

impl ListeningPort {
    pub fn new(port: u16, protocol: PortProtocol) -> Self {
        Self { port, protocol }
    }

    /// `https://localhost:N` for 443/8443, `http://localhost:N` for other TCP ports, nothing for
    /// UDP.
    pub fn suggested_url(&self) -> Option<String> {
        if self.protocol != PortProtocol::Tcp {
            return None;
        }
        let scheme = match self.port {
            443 | 8443 => "https",
            _ => "http",
        };
        Some(format!("{scheme}://localhost:{}", self.port))
    }
}

impl fmt::Display for ListeningPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol.as_str())
    }
}

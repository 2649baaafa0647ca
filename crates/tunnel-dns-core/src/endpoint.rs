//! Endpoint extraction from tunnel output
//!
//! Tunnel agents announce their public endpoints as free-form log lines of
//! the shape `<exposed host> => <local address>:<port> [trailing text]`.
//! [`extract_endpoint`] turns one such line into an [`Endpoint`].
//!
//! ## Grammar
//!
//! ```text
//! line      := left "=>" right
//! host      := left with every whitespace character removed      (non-empty)
//! port      := first whitespace-delimited token after the last ':' in right
//!              (the whole of right when it holds no ':')          (non-empty)
//! ```
//!
//! The line is split on the *first* separator only.

use std::fmt;

/// Token separating the exposed host from the local address
pub const SEPARATOR: &str = "=>";

/// A public endpoint announced by the tunnel agent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Public hostname assigned by the tunnel agent
    pub exposed_host: String,
    /// Local port the exposed host forwards to
    pub local_port: String,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(exposed_host: impl Into<String>, local_port: impl Into<String>) -> Self {
        Self {
            exposed_host: exposed_host.into(),
            local_port: local_port.into(),
        }
    }

    /// The local port as a number, when it is one
    pub fn port_number(&self) -> Option<u16> {
        self.local_port.parse().ok()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exposed_host, self.local_port)
    }
}

/// Parse one line of tunnel output into an [`Endpoint`]
///
/// Returns `None` when the line has no separator or when either side of it
/// is empty. Never fails otherwise: the output format is agent-specific and
/// most lines are expected not to match.
pub fn extract_endpoint(line: &str) -> Option<Endpoint> {
    let (left, right) = line.split_once(SEPARATOR)?;

    let exposed_host: String = left.chars().filter(|c| !c.is_whitespace()).collect();
    if exposed_host.is_empty() {
        return None;
    }

    let port_segment = match right.rfind(':') {
        Some(idx) => &right[idx + 1..],
        None => right,
    };
    let local_port = port_segment.split_whitespace().next()?;

    Some(Endpoint::new(exposed_host, local_port))
}

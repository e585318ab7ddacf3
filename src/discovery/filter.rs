use std::collections::HashSet;
use std::path::Path;

use super::AccessListError;

/// Whether listed entries are the only ones probed or the ones skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Allow,
    Deny,
}

impl std::str::FromStr for FilterMode {
    type Err = AccessListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "white" => Ok(Self::Allow),
            "deny" | "black" => Ok(Self::Deny),
            other => Err(AccessListError::UnknownMode(other.to_owned())),
        }
    }
}

/// Allow- or deny-list of container names and IP addresses.
///
/// An empty list admits everything regardless of its mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessList {
    mode: FilterMode,
    entries: HashSet<String>,
}

impl AccessList {
    pub fn new(mode: FilterMode, entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            mode,
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads an access list file.
    ///
    /// The first line holds the mode token (`allow`/`white` or `deny`/`black`),
    /// every following non-blank line is one container name or IP address.
    ///
    /// # Errors
    ///
    /// Returns [`AccessListError::Read`] if the file cannot be read. An
    /// unrecognized mode token is logged and read as `allow`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AccessListError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| AccessListError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decides whether `ip`, which belongs to the container `name`, is probed.
    pub fn admits(&self, ip: &str, name: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        let listed = self.entries.contains(ip) || self.entries.contains(name);
        match self.mode {
            FilterMode::Allow => listed,
            FilterMode::Deny => !listed,
        }
    }
}

impl std::str::FromStr for AccessList {
    type Err = AccessListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines();
        let mode = match lines.next() {
            Some(token) if !token.trim().is_empty() => {
                token.parse().unwrap_or_else(|err: AccessListError| {
                    log::warn!("{}, treating the access list as an allow list", err);
                    FilterMode::Allow
                })
            }
            _ => FilterMode::default(),
        };
        let entries = lines
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned);

        Ok(Self::new(mode, entries))
    }
}

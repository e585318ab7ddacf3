use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ContainerID`] or [`NetworkID`].
const ID_MAX_LEN: usize = 255;

/// A validated container identifier as reported by the container runtime.
///
/// # Examples
///
/// ```
/// # use reachwatch::container::ContainerID;
/// let container_id = ContainerID::new("4f1c2a9e0b7d").unwrap();
/// assert_eq!(container_id.as_ref(), "4f1c2a9e0b7d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or longer than
    /// [`ID_MAX_LEN`] bytes.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a container network, e.g. `bridge` or `app_default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkID(Arc<str>);

impl NetworkID {
    /// # Errors
    ///
    /// Returns [`Error::InvalidNetworkID`] if the input is empty or longer than
    /// [`ID_MAX_LEN`] bytes.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > ID_MAX_LEN {
            return Err(Error::InvalidNetworkID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }
}

impl AsRef<str> for NetworkID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NetworkID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A running container as returned by a runtime listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerID,
    /// Names as reported by the runtime. Docker prefixes them with `/`.
    pub names: Vec<String>,
}

impl ContainerSummary {
    pub fn new(id: ContainerID, names: Vec<String>) -> Self {
        Self { id, names }
    }

    /// Returns the primary name of the container without the leading `/`.
    ///
    /// Returns `None` if the runtime reported no usable name.
    pub fn primary_name(&self) -> Option<&str> {
        self.names
            .first()
            .map(|name| name.strip_prefix('/').unwrap_or(name))
            .filter(|name| !name.is_empty())
    }
}

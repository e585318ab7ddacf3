use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

use crate::container::{ContainerID, NetworkID};
use crate::discovery::ContainerRuntime;

use super::AttachError;

/// Connects the monitor's own container to the networks it probes.
///
/// Every network gets one once-cell. The map is only locked to look the cell up;
/// the runtime call runs outside the lock, so joining one network never delays
/// probes in another. Callers racing on the same network share a single join.
/// A failed join leaves the cell empty and is retried by the next caller.
pub struct NetworkAttacher<R> {
    runtime: Arc<R>,
    own_container: Option<ContainerID>,
    attachments: Mutex<HashMap<NetworkID, Arc<OnceCell<()>>>>,
}

impl<R: ContainerRuntime> NetworkAttacher<R> {
    /// Creates an attacher that treats `already_attached` as joined.
    pub fn new(
        runtime: Arc<R>,
        own_container: Option<ContainerID>,
        already_attached: impl IntoIterator<Item = NetworkID>,
    ) -> Self {
        let attachments = already_attached
            .into_iter()
            .map(|network| (network, Arc::new(OnceCell::new_with(Some(())))))
            .collect();
        Self {
            runtime,
            own_container,
            attachments: Mutex::new(attachments),
        }
    }

    pub fn is_attached(&self, network: &NetworkID) -> bool {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(network)
            .is_some_and(|cell| cell.initialized())
    }

    pub fn attached_networks(&self) -> BTreeSet<NetworkID> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(network, _)| network.clone())
            .collect()
    }

    /// Makes sure the own container is connected to `network`.
    ///
    /// # Errors
    ///
    /// - [`AttachError::UnknownSelf`] if the own container was never located.
    /// - [`AttachError::Runtime`] if the runtime refuses the connection.
    pub async fn ensure_attached(&self, network: &NetworkID) -> Result<(), AttachError> {
        let cell = {
            let mut attachments = self
                .attachments
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(attachments.entry(network.clone()).or_default())
        };
        if cell.initialized() {
            return Ok(());
        }

        let own = self
            .own_container
            .as_ref()
            .ok_or_else(|| AttachError::UnknownSelf(network.clone()))?;
        cell.get_or_try_init(|| async {
            log::info!("Connecting own container `{}` to network `{}`", own, network);
            self.runtime.attach(network, own).await
        })
        .await?;

        Ok(())
    }
}

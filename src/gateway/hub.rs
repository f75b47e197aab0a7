use crate::execution::ProgressMessage;
use crate::recording::DeviceMessage;
use ahash::AHashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Identifies one listener registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub device_id: String,
    pub flow_id: String,
}

impl ListenerKey {
    pub fn new(device_id: &str, flow_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            flow_id: flow_id.to_string(),
        }
    }
}

#[derive(Debug)]
struct Listener {
    device_tx: UnboundedSender<DeviceMessage>,
    progress_tx: UnboundedSender<ProgressMessage>,
}

/// Routes device and progress messages to the subscriptions registered for a device.
///
/// Clones share the same registry. Each (device, flow) pair holds at most one registration;
/// registering again replaces, and closes, the previous subscription.
#[derive(Debug, Clone, Default)]
pub struct ChannelHub {
    listeners: Arc<Mutex<AHashMap<ListenerKey, Listener>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<ListenerKey, Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_listener(&self, device_id: &str, flow_id: &str) -> Subscription {
        let key = ListenerKey::new(device_id, flow_id);
        let (device_tx, device_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let replaced = self
            .lock()
            .insert(key.clone(), Listener {
                device_tx,
                progress_tx,
            })
            .is_some();
        debug!(device_id, flow_id, replaced, "Listener registered");
        Subscription {
            key,
            device_rx,
            progress_rx,
        }
    }

    /// Removes the registration and closes its subscription. Returns `false` when there was none.
    pub fn unregister_listener(&self, device_id: &str, flow_id: &str) -> bool {
        let removed = self
            .lock()
            .remove(&ListenerKey::new(device_id, flow_id))
            .is_some();
        if removed {
            debug!(device_id, flow_id, "Listener unregistered");
        }
        removed
    }

    pub fn is_registered(&self, device_id: &str, flow_id: &str) -> bool {
        self.lock().contains_key(&ListenerKey::new(device_id, flow_id))
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `message` to every listener of `device_id`. Returns how many received it.
    pub fn publish_device(&self, device_id: &str, message: DeviceMessage) -> usize {
        self.publish(device_id, |listener| listener.device_tx.send(message.clone()).is_ok())
    }

    /// Delivers `message` to every listener of `device_id`. Returns how many received it.
    pub fn publish_progress(&self, device_id: &str, message: ProgressMessage) -> usize {
        self.publish(device_id, |listener| listener.progress_tx.send(message.clone()).is_ok())
    }

    fn publish(&self, device_id: &str, mut send: impl FnMut(&Listener) -> bool) -> usize {
        let mut listeners = self.lock();
        let mut delivered = 0;
        // Registrations whose subscription was dropped are pruned on the way.
        listeners.retain(|key, listener| {
            if key.device_id != device_id {
                return true;
            }
            let ok = send(listener);
            if ok {
                delivered += 1;
            }
            ok
        });
        delivered
    }
}

/// The receiving end of a listener registration.
#[derive(Debug)]
pub struct Subscription {
    key: ListenerKey,
    device_rx: UnboundedReceiver<DeviceMessage>,
    progress_rx: UnboundedReceiver<ProgressMessage>,
}

impl Subscription {
    pub fn key(&self) -> &ListenerKey {
        &self.key
    }

    pub fn device_id(&self) -> &str {
        &self.key.device_id
    }

    pub fn flow_id(&self) -> &str {
        &self.key.flow_id
    }

    pub fn try_next_device(&mut self) -> Option<DeviceMessage> {
        self.device_rx.try_recv().ok()
    }

    pub fn try_next_progress(&mut self) -> Option<ProgressMessage> {
        self.progress_rx.try_recv().ok()
    }

    /// Waits for the next device message. `None` once the registration is gone.
    pub async fn next_device(&mut self) -> Option<DeviceMessage> {
        self.device_rx.recv().await
    }

    /// Waits for the next progress message. `None` once the registration is gone.
    pub async fn next_progress(&mut self) -> Option<ProgressMessage> {
        self.progress_rx.recv().await
    }
}

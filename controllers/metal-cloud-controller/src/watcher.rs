//! Resource informers
//!
//! Each informer runs a `kube_runtime` watch with default backoff, keeps a reflector
//! store up to date and forwards every change to its reconciler as a
//! [`ResourceEvent`].

use crate::reconciler::ResourceEvent;
use futures::StreamExt;
use kube::{Api, Resource};
use kube_runtime::reflector::{self, Store};
use kube_runtime::watcher::{self, Event};
use kube_runtime::WatchStreamExt;
use metal_client::ObjectKey;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Translate a watch event into reconciler messages
fn to_resource_event<K: Resource>(event: &Event<K>) -> Option<ResourceEvent> {
    match event {
        Event::InitApply(obj) => Some(ResourceEvent::Added(ObjectKey::from_resource(obj))),
        Event::Apply(obj) => Some(ResourceEvent::Updated(ObjectKey::from_resource(obj))),
        Event::Delete(obj) => Some(ResourceEvent::Deleted(ObjectKey::from_resource(obj))),
        Event::Init | Event::InitDone => None,
    }
}

/// Start watching `api`
///
/// Returns the informer's store, which becomes ready after the initial list, and the
/// task driving the watch. The task ends when `cancel` fires or the receiving side of
/// `events` is dropped.
pub fn spawn<K>(
    api: Api<K>,
    events: UnboundedSender<ResourceEvent>,
    cancel: CancellationToken,
) -> (Store<K>, JoinHandle<()>)
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone + Send + Sync,
{
    let kind = K::kind(&K::DynamicType::default()).to_string();
    let (reader, writer) = reflector::store();

    let handle = tokio::spawn(async move {
        info!("Starting {} informer", kind);
        let stream = watcher::watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer);
        let mut stream = std::pin::pin!(stream);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        let Some(event) = to_resource_event(&event) else {
                            continue;
                        };
                        debug!("{} event: {:?}", kind, event);
                        if events.send(event).is_err() {
                            debug!("{} reconciler is gone, stopping informer", kind);
                            break;
                        }
                    }
                    Some(Err(e)) => warn!("{} watch error: {}", kind, e),
                    None => break,
                },
            }
        }
        info!("Stopping {} informer", kind);
    });

    (reader, handle)
}

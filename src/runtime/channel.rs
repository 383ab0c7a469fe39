use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio::runtime::Runtime;

use crate::{
    ShareLock,
    common::{BroadcastQueue, Shutdown},
    events::{Event, JobFinished, Message},
    model::ProcessId,
};

macro_rules! dispatch_event {
    ($handles:expr, $(&$item:ident), +) => {
        let handlers = $handles.read().unwrap();
        for handle in handlers.iter() {
            (handle)($(&$item),+);
        }
    };
}

macro_rules! dispatch_event_async {
    ($handles:expr, $(&$item:ident), +) => {
        let handles = $handles.clone();

        tokio::spawn(async move {
            let handlers = handles.read().unwrap().clone();
            for handle in handlers.iter() {
                (handle)($(&$item),+).await;
            }
        });
    };
}

const EVENT_QUEUE_SIZE: usize = 2048;

pub type ServiceEventHandle = Arc<dyn Fn(&Event<Message>) + Send + Sync>;
pub type ServiceEventHandleAsync = Arc<dyn Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ChannelOptions {
    /// only deliver events of this process, all processes when `None`
    pub process_id: Option<ProcessId>,
}

impl ChannelOptions {
    pub fn with_process_id(process_id: ProcessId) -> Self {
        Self {
            process_id: Some(process_id),
        }
    }

    fn is_match(
        &self,
        e: &Event<Message>,
    ) -> bool {
        self.process_id.is_none_or(|pid| pid == e.process_id)
    }
}

#[derive(Clone)]
pub struct Channel {
    event_queue: Arc<BroadcastQueue<Event<Message>>>,

    events: ShareLock<Vec<ServiceEventHandle>>,
    events_async: ShareLock<Vec<ServiceEventHandleAsync>>,

    runtime: Arc<Runtime>,
    shutdown: Arc<Shutdown>,
}

impl Channel {
    pub(crate) fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            event_queue: BroadcastQueue::new(EVENT_QUEUE_SIZE),
            events: Arc::new(RwLock::new(Vec::new())),
            events_async: Arc::new(RwLock::new(Vec::new())),
            runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub(crate) fn event_queue(&self) -> Arc<BroadcastQueue<Event<Message>>> {
        self.event_queue.clone()
    }

    pub(crate) fn listen(&self) {
        let mut event_queue = self.event_queue.subscribe();
        let events = self.events.clone();
        let events_async = self.events_async.clone();

        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    Ok(e) = event_queue.recv() => {
                        let evt = e.clone();
                        dispatch_event!(events, &evt);
                        dispatch_event_async!(events_async, &e);
                    }
                }
            }
        });
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.shutdown();
    }
}

/// Subscription to the events of a service, optionally narrowed to one process.
#[derive(Clone)]
pub struct ChannelEvent {
    channel: Arc<Channel>,
    options: ChannelOptions,
}

impl ChannelEvent {
    pub fn channel(
        channel: Arc<Channel>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            channel,
            options,
        }
    }

    /// Called for every finished package, whatever its result.
    pub fn on_finished(
        &self,
        f: impl Fn(&JobFinished) + Send + Sync + 'static,
    ) {
        let options = self.options.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            match e.event.finished() {
                Some(finished) if options.is_match(e) => f(finished),
                _ => {}
            }
        }));
    }

    /// Called for every package that finished with an error.
    pub fn on_error(
        &self,
        f: impl Fn(&JobFinished) + Send + Sync + 'static,
    ) {
        let options = self.options.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if !e.event.is_error() || !options.is_match(e) {
                return;
            }
            if let Some(finished) = e.event.finished() {
                f(finished);
            }
        }));
    }

    pub fn on_event(
        &self,
        f: impl Fn(&Event<Message>) + Send + Sync + 'static,
    ) {
        let options = self.options.clone();

        self.channel.events.write().unwrap().push(Arc::new(move |e| {
            if options.is_match(e) {
                f(e);
            }
        }));
    }

    pub fn on_event_async<F>(
        &self,
        f: F,
    ) where
        F: Fn(&Event<Message>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let options = self.options.clone();

        self.channel.events_async.write().unwrap().push(Arc::new(move |e| {
            if options.is_match(e) {
                f(e)
            } else {
                Box::pin(async {})
            }
        }));
    }
}

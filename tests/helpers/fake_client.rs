//! In-process stand-ins for the language client and the user notifier.
//!
//! Every interaction is appended to a shared [`Recorder`] so tests can
//! assert what was created, started, stopped and reported, without
//! spawning a process.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use drools_lsp_client::activation::Notifier;
use drools_lsp_client::client::{
    ClientError, ClientFactory, ClientFuture, ClientOptions, LanguageClient,
};
use drools_lsp_client::server::LaunchSpec;

/// Something that happened to a fake client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Created {
        id: String,
        name: String,
        spec: LaunchSpec,
    },
    Started,
    Stopped,
    Notified(String),
}

/// Shared, cloneable event log.
#[derive(Debug, Default, Clone)]
pub struct Recorder(Arc<Mutex<Vec<Event>>>);

impl Recorder {
    pub fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Launch specs of every created client, in order.
    pub fn spawn_requests(&self) -> Vec<LaunchSpec> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Created { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Messages shown to the user, in order.
    pub fn notifications(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Notified(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl Notifier for Recorder {
    fn show_error(&self, message: &str) {
        self.record(Event::Notified(message.to_string()));
    }
}

/// Client that only records its lifecycle.
pub struct FakeClient {
    recorder: Recorder,
}

impl LanguageClient for FakeClient {
    fn start(&mut self) -> ClientFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.recorder.record(Event::Started);
            Ok(())
        })
    }

    fn stop(&mut self) -> ClientFuture<'_, Result<(), ClientError>> {
        Box::pin(async move {
            self.recorder.record(Event::Stopped);
            Ok(())
        })
    }
}

/// Factory producing [`FakeClient`]s.
#[derive(Debug, Default, Clone)]
pub struct FakeFactory {
    pub recorder: Recorder,
}

impl ClientFactory for FakeFactory {
    type Client = FakeClient;

    fn create(&self, id: &str, name: &str, spec: LaunchSpec, _options: ClientOptions) -> FakeClient {
        self.recorder.record(Event::Created {
            id: id.to_string(),
            name: name.to_string(),
            spec,
        });
        FakeClient {
            recorder: self.recorder.clone(),
        }
    }
}

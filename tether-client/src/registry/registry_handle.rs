use crate::engine::{MediaEngine, MediaSource};
use crate::error::{Error, LookupError, NegotiationError};
use crate::peer::PeerSessionHandle;
use crate::registry::{RegistryCommand, RegistryConfig, SessionObserver, SessionRegistry};
use crate::signaling::SignalingOutput;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Contact, ContactId};
use tokio::sync::{mpsc, oneshot};

/// Client-side entry point to the registry task.
#[derive(Clone)]
pub struct SessionRegistryHandle {
    tx: mpsc::UnboundedSender<RegistryCommand>,
}

impl SessionRegistryHandle {
    /// Spawns the registry task. Must be called inside a tokio runtime.
    pub fn spawn(
        config: RegistryConfig,
        engine: Arc<dyn MediaEngine>,
        signaling: Arc<dyn SignalingOutput>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = SessionRegistry::new(config, engine, signaling, observer, rx);
        tokio::spawn(registry.run());
        Self { tx }
    }

    pub fn send(&self, cmd: RegistryCommand) -> Result<(), LookupError> {
        self.tx.send(cmd).map_err(|_| LookupError::RegistryClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, LookupError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply))?;
        rx.await.map_err(|_| LookupError::RegistryClosed)
    }

    pub async fn get_or_create(&self, contact: Contact) -> Result<PeerSessionHandle, LookupError> {
        self.request(|reply| RegistryCommand::GetOrCreate { contact, reply })
            .await
    }

    /// Closes and forgets the session with `contact`. Returns whether one
    /// existed.
    pub async fn remove(&self, contact: ContactId) -> Result<bool, LookupError> {
        self.request(|reply| RegistryCommand::Remove { contact, reply })
            .await
    }

    /// Resolves once every session is closed.
    pub async fn close_all(&self) -> Result<(), LookupError> {
        self.request(|reply| RegistryCommand::CloseAll { reply }).await
    }

    pub async fn call(&self, contact: Contact, with_video: bool) -> Result<(), Error> {
        let outcome = self
            .request(|reply| RegistryCommand::Call {
                contact,
                with_video,
                reply,
            })
            .await;

        match outcome {
            Ok(result) => Ok(result?),
            // The session dropped the reply while closing.
            Err(LookupError::RegistryClosed) if !self.tx.is_closed() => {
                Err(NegotiationError::Interrupted.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn send_message(
        &self,
        text: impl Into<String>,
        contact: Option<ContactId>,
    ) -> Result<(), Error> {
        let text = text.into();
        self.request(|reply| RegistryCommand::SendMessage {
            text,
            contact,
            reply,
        })
        .await?
    }

    pub async fn hangup(&self, contact: Option<ContactId>) -> Result<(), LookupError> {
        self.request(|reply| RegistryCommand::Hangup { contact, reply })
            .await?
    }

    /// Pauses or resumes a local source in the session with `contact`, or
    /// with the active contact.
    pub async fn set_source_enabled(
        &self,
        source: MediaSource,
        enabled: bool,
        contact: Option<ContactId>,
    ) -> Result<(), LookupError> {
        self.request(|reply| RegistryCommand::SetSourceEnabled {
            source,
            enabled,
            contact,
            reply,
        })
        .await?
    }

    pub async fn report_stats(
        &self,
        period: Option<Duration>,
        contact: Option<ContactId>,
    ) -> Result<(), LookupError> {
        self.request(|reply| RegistryCommand::ReportStats {
            period,
            contact,
            reply,
        })
        .await?
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>, LookupError> {
        self.request(|reply| RegistryCommand::Contacts { reply })
            .await
    }
}

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host refused or could not accept an outgoing message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A mod tried to use the host surface without registering first.
    #[error("mod {0:?} is not registered")]
    NotRegistered(String),

    /// A mod with the same name is already registered on this page.
    #[error("mod {0:?} is already registered")]
    AlreadyRegistered(String),

    /// The mod metadata is unusable (e.g. an empty name).
    #[error("invalid mod info: {0}")]
    InvalidModInfo(String),

    /// The host side of the channel is gone.
    #[error("host shut down")]
    Shutdown,
}

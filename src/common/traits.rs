use crate::Result;
use crate::correlator::{Correlator, ExchangeError};
use crate::framing::ResponsePayload;
use async_trait::async_trait;
use tokio::io::AsyncWrite;

/// Something that turns a `METHOD PATH` request line into a device response
///
/// The HTTP front only depends on this trait, so it runs equally against the
/// serial correlator or a test double.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn exchange(&self, request_line: &str) -> std::result::Result<ResponsePayload, ExchangeError>;
}

#[async_trait]
impl<W> RequestHandler for Correlator<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn exchange(&self, request_line: &str) -> std::result::Result<ResponsePayload, ExchangeError> {
        Correlator::exchange(self, request_line).await
    }
}

/// Common interface of long-running bridge servers
#[allow(async_fn_in_trait)]
pub trait BridgeServer {
    /// Serves until shutdown is requested or a fatal error occurs
    async fn run(&self) -> Result<()>;

    /// Returns a sender that gracefully stops the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}

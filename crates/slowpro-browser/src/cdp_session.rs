use crate::ingest::{
    LOADING_FAILED, LOADING_FINISHED, REQUEST_WILL_BE_SENT, RESPONSE_RECEIVED, RawCdpEvent, normalize,
};
use crate::Result;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived,
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use slowpro_core::event::NetworkEvent;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Counters of the CDP event forwarder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub received: usize,
    pub forwarded: usize,
}

/// A running CDP capture.
///
/// The forwarder stops when [`stop`] is called, when the browser goes away
/// or when the receiving end of the event channel is dropped. In every case
/// the event sender is dropped, closing the intake.
///
/// [`stop`]: CdpCapture::stop
pub struct CdpCapture {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<ForwardStats>,
}

impl CdpCapture {
    /// True once the forwarder has exited on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn stop(self) -> ForwardStats {
        let _ = self.shutdown.send(());
        self.task.await.unwrap_or_else(|e| {
            tracing::warn!("CDP forwarder task ended abnormally: {}", e);
            ForwardStats::default()
        })
    }
}

/// Manages Chrome DevTools Protocol session
pub struct CdpSession {
    debugging_port: u16,
}

impl CdpSession {
    pub fn new(debugging_port: u16) -> Self {
        Self { debugging_port }
    }

    /// Connect to Chrome and forward normalized network events into `sink`
    pub async fn capture_events(&self, sink: mpsc::Sender<NetworkEvent>) -> Result<CdpCapture> {
        tracing::info!(
            "CDP session: connecting to Chrome on port {}",
            self.debugging_port
        );

        // Chrome may not be accepting connections yet
        let ws_url = format!("http://localhost:{}", self.debugging_port);
        let (browser, mut handler) = {
            let mut retries = 5;
            loop {
                tracing::debug!("Attempting CDP connection to {}...", ws_url);
                match Browser::connect(&ws_url).await {
                    Ok(result) => {
                        tracing::info!("CDP connection established");
                        break result;
                    }
                    Err(e) => {
                        retries -= 1;
                        if retries == 0 {
                            return Err(crate::Error::Cdp(format!(
                                "Failed to connect to Chrome after 5 attempts: {}",
                                e
                            )));
                        }
                        tracing::info!(
                            "CDP connection attempt failed, retrying... ({} left)",
                            retries
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                    }
                }
            }
        };

        // The handler must be polled for any browser command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        // Give Chrome a moment to open its initial page
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;

        let page = if let Some(page) = browser.pages().await?.first() {
            tracing::debug!("CDP: Using existing page");
            page.clone()
        } else {
            tracing::debug!("CDP: No existing pages, creating new page");
            browser.new_page("about:blank").await?
        };

        page.execute(EnableParams::default()).await?;
        tracing::info!("CDP session: Network domain enabled, starting event capture");

        let mut sent = page.event_listener::<EventRequestWillBeSent>().await?;
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut finished = page.event_listener::<EventLoadingFinished>().await?;
        let mut failed = page.event_listener::<EventLoadingFailed>().await?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // Keeps the connection open for the lifetime of the capture
            let _browser = browser;
            let stats = forward_events(sent, responses, finished, failed, shutdown_rx, sink).await;
            handler_task.abort();
            stats
        });

        Ok(CdpCapture {
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Merge the four network event streams into `sink`.
///
/// Chromiumoxide delivers each event type on its own channel but dispatches
/// them in wire order, so by the time a later lifecycle stage is buffered the
/// earlier stages of that request are too. Polling in lifecycle order keeps
/// the events of one request id in order.
async fn forward_events<S, R, F, L, Es, Er, Ef, El>(
    mut sent: S,
    mut responses: R,
    mut finished: F,
    mut failed: L,
    mut shutdown: oneshot::Receiver<()>,
    sink: mpsc::Sender<NetworkEvent>,
) -> ForwardStats
where
    S: Stream<Item = Arc<Es>> + Unpin,
    R: Stream<Item = Arc<Er>> + Unpin,
    F: Stream<Item = Arc<Ef>> + Unpin,
    L: Stream<Item = Arc<El>> + Unpin,
    Es: Serialize,
    Er: Serialize,
    Ef: Serialize,
    El: Serialize,
{
    let mut stats = ForwardStats::default();
    // sent, responses, finished, failed
    let mut open = [true; 4];

    loop {
        if open.iter().all(|o| !o) {
            tracing::info!("CDP capture: browser event streams closed");
            break;
        }

        let event = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("CDP capture: shutdown signal received, stopping capture");
                break;
            }
            event = sent.next(), if open[0] => match event {
                Some(event) => to_network_event(REQUEST_WILL_BE_SENT, &*event),
                None => { open[0] = false; continue; }
            },
            event = responses.next(), if open[1] => match event {
                Some(event) => to_network_event(RESPONSE_RECEIVED, &*event),
                None => { open[1] = false; continue; }
            },
            event = finished.next(), if open[2] => match event {
                Some(event) => to_network_event(LOADING_FINISHED, &*event),
                None => { open[2] = false; continue; }
            },
            event = failed.next(), if open[3] => match event {
                Some(event) => to_network_event(LOADING_FAILED, &*event),
                None => { open[3] = false; continue; }
            },
        };

        stats.received += 1;
        let Some(event) = event else { continue };
        if sink.send(event).await.is_err() {
            tracing::debug!("CDP capture: intake closed, stopping forwarder");
            break;
        }
        stats.forwarded += 1;
    }

    stats
}

/// Re-serialize a typed CDP event into its wire form and normalize it
fn to_network_event<E: Serialize>(method: &str, event: &E) -> Option<NetworkEvent> {
    match serde_json::to_value(event) {
        Ok(params) => normalize(&RawCdpEvent::new(method, params)),
        Err(e) => {
            tracing::warn!("Could not serialize {} event: {}", method, e);
            None
        }
    }
}

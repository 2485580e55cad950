//! Envelopes over byte streams.
//!
//! Frames are read with [`FrameCodec`] and handed to an [`Endpoint`]. The
//! pump owns nothing but the reader; dispatch still happens in the endpoint's
//! drain loop.

use crate::core::frame::FrameCodec;
use crate::error::Result;
use crate::protocol::endpoint::Endpoint;
use crate::protocol::message::Envelope;
use crate::utils::timeout::with_timeout;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

/// What happened to the frames read by [`pump_inbound`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundReport {
    /// Frames read off the stream
    pub frames: usize,
    /// Frames decoded and enqueued
    pub accepted: usize,
    /// Frames that failed to decode or arrived after the queue closed
    pub rejected: usize,
}

/// Read frames from `reader` into `endpoint` until the stream ends.
///
/// A frame that fails to decode is reported and skipped. End of stream, a
/// broken frame or `idle_timeout` without a frame all disconnect the
/// endpoint; only the broken frame is returned as an error.
#[instrument(skip_all, fields(endpoint = %endpoint.name()))]
pub async fn pump_inbound<R, C>(reader: R, endpoint: &Endpoint<C>, idle_timeout: Duration) -> Result<InboundReport>
where
    R: AsyncRead + Unpin,
    C: 'static,
{
    let max_frame_size = endpoint.max_frame_size();
    let mut frames = FramedRead::new(reader, FrameCodec::new(max_frame_size));
    let mut report = InboundReport::default();

    let outcome = loop {
        let Some(next) = with_timeout(idle_timeout, frames.next()).await else {
            info!(idle_ms = idle_timeout.as_millis() as u64, "Inbound stream idle, disconnecting");
            break Ok(());
        };

        match next {
            Some(Ok(frame)) => {
                report.frames += 1;
                match endpoint.receive(&frame) {
                    Ok(()) => report.accepted += 1,
                    Err(e) => {
                        report.rejected += 1;
                        debug!(error = %e, "Inbound frame rejected");
                    }
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "Inbound framing error, disconnecting");
                break Err(e);
            }
            None => {
                debug!("Inbound stream closed");
                break Ok(());
            }
        }
    };

    endpoint.disconnect();
    outcome.map(|()| report)
}

/// Frame writer sized for `endpoint`
pub fn outbound<W, C>(writer: W, endpoint: &Endpoint<C>) -> FramedWrite<W, FrameCodec>
where
    W: AsyncWrite + Unpin,
    C: 'static,
{
    FramedWrite::new(writer, FrameCodec::new(endpoint.max_frame_size()))
}

/// Encode `envelope` and write it as one frame
pub async fn send_envelope<W, C>(
    sink: &mut FramedWrite<W, FrameCodec>,
    endpoint: &Endpoint<C>,
    envelope: &Envelope,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    C: 'static,
{
    let bytes = endpoint.send(envelope)?;
    sink.send(bytes).await
}

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{AiError, ProviderErrorKind};
use crate::http::HttpBodyStream;

/// Standardized SSE event yielded by [`SseDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Raw `data:` payload emitted by the provider.
    Data(String),
    /// Terminal marker reported via `[DONE]`.
    Done,
}

/// Normalizes provider SSE feeds into [`SseEvent`] values.
///
/// Only `data:` lines are interpreted; `event:`, `id:` and comment lines are
/// ignored because both vendors repeat the event type inside the JSON payload.
pub struct SseDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    data_lines: Vec<Vec<u8>>,
    pending: VecDeque<Result<SseEvent, AiError>>,
    provider: &'static str,
    stream_closed: bool,
    done_received: bool,
}

impl SseDecoder {
    /// Wraps a raw HTTP body stream and prepares it for SSE decoding.
    pub fn new(body: HttpBodyStream, provider: &'static str) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            data_lines: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            done_received: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        if let Some(rest) = line.strip_prefix(b"data:") {
            let data = rest.strip_prefix(b" ").unwrap_or(rest);
            self.data_lines.push(data.to_vec());
        }
    }

    fn flush_event(&mut self) -> Result<(), AiError> {
        if self.data_lines.is_empty() {
            return Ok(());
        }

        let joined = self.data_lines.drain(..).collect::<Vec<_>>().join(&b'\n');
        if joined.is_empty() {
            return Ok(());
        }

        let data = String::from_utf8(joined).map_err(|err| {
            AiError::provider(
                self.provider,
                ProviderErrorKind::MalformedResponse,
                format!("invalid UTF-8 in stream chunk: {err}"),
            )
        })?;

        if data.trim() == "[DONE]" {
            if !self.done_received {
                self.done_received = true;
                self.pending.push_back(Ok(SseEvent::Done));
            }
        } else {
            self.pending.push_back(Ok(SseEvent::Data(data)));
        }

        Ok(())
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for SseDecoder {
    type Item = Result<SseEvent, AiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(event) = this.pending.pop_front() {
            return Poll::Ready(Some(event));
        }

        if this.done_received {
            return Poll::Ready(None);
        }

        loop {
            if this.stream_closed {
                if !this.buffer.is_empty() {
                    let line = this.buffer.drain(..).collect::<Vec<u8>>();
                    this.handle_line(line);
                }
                if let Err(err) = this.flush_event() {
                    return Poll::Ready(Some(Err(err)));
                }
                return Poll::Ready(this.pending.pop_front());
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        if line.is_empty() {
                            if let Err(err) = this.flush_event() {
                                return Poll::Ready(Some(Err(err)));
                            }
                        } else {
                            this.handle_line(line);
                        }
                    }
                    if let Some(event) = this.pending.pop_front() {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    return Poll::Ready(Some(Err(AiError::provider(
                        this.provider,
                        ProviderErrorKind::Transport,
                        err.to_string(),
                    ))));
                }
                Poll::Ready(None) => {
                    this.stream_closed = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Outcome of interpreting one SSE data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TextDelta {
    /// A text fragment to hand to the caller.
    Text(String),
    /// A bookkeeping event without caller-visible text.
    Skip,
    /// The vendor signalled the end of the generation.
    Finished,
}

/// Vendor-specific interpretation of a single SSE data payload.
pub(crate) type DeltaParser = fn(&str, &'static str) -> Result<TextDelta, AiError>;

/// Adapts an [`SseDecoder`] into a stream of text fragments.
///
/// Ends after the vendor's completion signal. A body that closes before that
/// signal yields a single [`ProviderErrorKind::StreamClosed`] error. The first
/// error ends the stream.
pub(crate) struct TextDeltaStream {
    events: SseDecoder,
    parse: DeltaParser,
    provider: &'static str,
    finished: bool,
}

impl TextDeltaStream {
    pub(crate) fn new(body: HttpBodyStream, provider: &'static str, parse: DeltaParser) -> Self {
        Self {
            events: SseDecoder::new(body, provider),
            parse,
            provider,
            finished: false,
        }
    }
}

impl Stream for TextDeltaStream {
    type Item = Result<String, AiError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            let event = match Pin::new(&mut this.events).poll_next(cx) {
                Poll::Ready(event) => event,
                Poll::Pending => return Poll::Pending,
            };

            match event {
                Some(Ok(SseEvent::Data(data))) => match (this.parse)(&data, this.provider) {
                    Ok(TextDelta::Text(text)) => return Poll::Ready(Some(Ok(text))),
                    Ok(TextDelta::Skip) => continue,
                    Ok(TextDelta::Finished) => {
                        this.finished = true;
                        return Poll::Ready(None);
                    }
                    Err(err) => {
                        this.finished = true;
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                Some(Ok(SseEvent::Done)) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(err)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(AiError::provider(
                        this.provider,
                        ProviderErrorKind::StreamClosed,
                        "stream ended before the completion signal",
                    ))));
                }
            }
        }
    }
}

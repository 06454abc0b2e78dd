//! Message ↔ frame codec for both relay legs.
//!
//! - Text/Binary messages become opaque `Frame`s (tag preserved)
//! - Ping/Pong are answered by each transport and never relayed
//! - Close ends the stream of the leg that received it

use std::future::{ready, Ready};

use axum::extract::ws::Message as BrowserMessage;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message as BackendMessage;
use vncrelay_core::Frame;

/// What one transport message means to the relay.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    Data(Frame),
    Control,
    Close,
}

pub fn decode_browser(msg: BrowserMessage) -> Decoded {
    match msg {
        BrowserMessage::Text(s) => Decoded::Data(Frame::Text(s)),
        BrowserMessage::Binary(b) => Decoded::Data(Frame::from(b)),
        BrowserMessage::Ping(_) | BrowserMessage::Pong(_) => Decoded::Control,
        BrowserMessage::Close(_) => Decoded::Close,
    }
}

pub fn encode_browser(frame: Frame) -> BrowserMessage {
    match frame {
        Frame::Text(s) => BrowserMessage::Text(s),
        Frame::Binary(b) => BrowserMessage::Binary(Vec::from(b)),
    }
}

pub fn decode_backend(msg: BackendMessage) -> Decoded {
    match msg {
        BackendMessage::Text(s) => Decoded::Data(Frame::Text(s)),
        BackendMessage::Binary(b) => Decoded::Data(Frame::from(b)),
        BackendMessage::Ping(_) | BackendMessage::Pong(_) | BackendMessage::Frame(_) => {
            Decoded::Control
        }
        BackendMessage::Close(_) => Decoded::Close,
    }
}

pub fn encode_backend(frame: Frame) -> BackendMessage {
    match frame {
        Frame::Text(s) => BackendMessage::Text(s),
        Frame::Binary(b) => BackendMessage::Binary(Vec::from(b)),
    }
}

/// Adapt a transport message stream into a stream of data frames.
///
/// The stream ends at the first close message; control messages are skipped.
pub fn frame_stream<S, M, E>(
    stream: S,
    decode: fn(M) -> Decoded,
) -> impl Stream<Item = Result<Frame, E>> + Unpin
where
    S: Stream<Item = Result<M, E>> + Unpin,
{
    stream
        .map(move |r| r.map(decode))
        .take_while(|r| ready(!matches!(r, Ok(Decoded::Close))))
        .filter_map(|r| {
            ready(match r {
                Ok(Decoded::Data(f)) => Some(Ok(f)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        })
}

/// Adapt a transport message sink into a sink of data frames.
pub fn frame_sink<K, M>(
    sink: K,
    encode: fn(Frame) -> M,
) -> impl Sink<Frame, Error = K::Error> + Unpin
where
    K: Sink<M> + Unpin,
{
    sink.with(move |f: Frame| -> Ready<Result<M, K::Error>> { ready(Ok(encode(f))) })
}

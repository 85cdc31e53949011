//! Streaming Reply Consumer
//!
//! Obtains the assistant's reply for one submission. The reply is read from
//! the chat collaborator's incremental stream when possible; if the stream
//! cannot be opened, or breaks at any point, it is abandoned and exactly one
//! non-streaming request is made with the same history and options.
//!
//! # Display Contract
//!
//! Every increment taken from the stream is appended to an accumulator and the
//! sink is handed the *accumulated* text, so a sink always holds the full
//! reply so far and simply re-renders it. The fallback path never touches the
//! sink: its text arrives only in the returned [`AssembledReply`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::{ChatApi, ChatRequest, GenerationOptions, HistoryMessage, StreamingToken};
use crate::error::{BackendError, StreamError};
use crate::messages::ChatTurn;
use crate::session::build_history;
use crate::stream::StreamToken;

/// Text used when the fallback request answers with an empty message
pub const EMPTY_REPLY_PLACEHOLDER: &str = "Sorry, no reply could be obtained.";

/// Receives the growing reply while it streams
#[async_trait]
pub trait ReplySink: Send {
    /// Called after each increment with the full reply so far
    async fn partial(&mut self, assembled: &str);
}

#[async_trait]
impl ReplySink for Vec<String> {
    async fn partial(&mut self, assembled: &str) {
        self.push(assembled.to_string());
    }
}

/// Where the final reply text came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplySource {
    /// Assembled from the incremental stream
    Stream,
    /// Returned by the single fallback request
    Fallback,
}

/// A finished reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledReply {
    /// Final reply text
    pub text: String,
    /// Which path produced it
    pub source: ReplySource,
    /// Number of non-empty stream increments consumed
    pub increments: u32,
}

/// Consumes streamed replies from a chat collaborator
pub struct StreamingChatConsumer<C: ChatApi> {
    chat: Arc<C>,
}

impl<C: ChatApi> Clone for StreamingChatConsumer<C> {
    fn clone(&self) -> Self {
        Self {
            chat: Arc::clone(&self.chat),
        }
    }
}

impl<C: ChatApi> StreamingChatConsumer<C> {
    /// Create a consumer over a chat collaborator
    pub fn new(chat: Arc<C>) -> Self {
        Self { chat }
    }

    /// Obtain the reply to `new_user_text` given the transcript so far
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] only if both the stream and the fallback
    /// request fail.
    pub async fn consume(
        &self,
        transcript: &[ChatTurn],
        new_user_text: &str,
        options: &GenerationOptions,
        sink: &mut dyn ReplySink,
    ) -> Result<AssembledReply, StreamError> {
        let history = build_history(transcript, new_user_text);
        self.consume_history(history, options, sink).await
    }

    /// Obtain the reply for an already-built history
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] only if both the stream and the fallback
    /// request fail.
    pub async fn consume_history(
        &self,
        history: Vec<HistoryMessage>,
        options: &GenerationOptions,
        sink: &mut dyn ReplySink,
    ) -> Result<AssembledReply, StreamError> {
        let request = ChatRequest::new(history).with_options(*options);

        match self.stream_reply(&request, sink).await {
            Ok(reply) => Ok(reply),
            Err(stream_error) => {
                tracing::warn!(
                    error = %stream_error,
                    "Streaming failed, falling back to a single request"
                );
                self.fallback(&request, stream_error).await
            }
        }
    }

    async fn stream_reply(
        &self,
        request: &ChatRequest,
        sink: &mut dyn ReplySink,
    ) -> Result<AssembledReply, BackendError> {
        let mut rx = self.chat.send_message_stream(request).await?;

        let mut assembled = String::new();
        let mut increments = 0u32;

        while let Some(unit) = rx.recv().await {
            match unit {
                StreamingToken::Chunk(chunk) => {
                    let token = StreamToken::from(chunk);
                    let Some(text) = token.increment() else {
                        tracing::trace!("Skipping stream unit without text");
                        continue;
                    };

                    assembled.push_str(text);
                    increments += 1;
                    sink.partial(&assembled).await;
                }
                StreamingToken::Done => break,
                StreamingToken::Error(error) => return Err(BackendError::Stream(error)),
            }
        }

        tracing::debug!(increments, chars = assembled.len(), "Stream complete");

        Ok(AssembledReply {
            text: assembled,
            source: ReplySource::Stream,
            increments,
        })
    }

    async fn fallback(
        &self,
        request: &ChatRequest,
        stream_error: BackendError,
    ) -> Result<AssembledReply, StreamError> {
        match self.chat.send_message(request).await {
            Ok(reply) => {
                let text = if reply.message.is_empty() {
                    EMPTY_REPLY_PLACEHOLDER.to_string()
                } else {
                    reply.message
                };
                Ok(AssembledReply {
                    text,
                    source: ReplySource::Fallback,
                    increments: 0,
                })
            }
            Err(fallback) => Err(StreamError::FallbackFailed {
                stream: stream_error.to_string(),
                fallback,
            }),
        }
    }
}

//! Per-channel token buffers of actor input ports.
//!
//! A [`Receiver`] holds tokens together with their tags, oldest tag first and
//! in arrival order among equal tags. A token can only be retrieved when its
//! tag is exactly the tag at which the owning actor is being fired, so that
//! an actor never observes a token early.

use std::collections::vec_deque::{self, VecDeque};
use std::error::Error;
use std::fmt;

use tracing::warn;

use crate::time::Tag;
use crate::token::Token;

/// Behavior of a receiver when a token arrives with a tag earlier than a
/// token already retrieved.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReceiverMode {
    /// Out-of-order tokens are rejected with an error.
    #[default]
    Strict,
    /// Out-of-order tokens are accepted with a warning.
    Lenient,
}

/// A tag-ordered token buffer for one input channel.
#[derive(Clone, Debug, Default)]
pub struct Receiver {
    buffer: VecDeque<(Token, Tag)>,
    mode: ReceiverMode,
    last_retrieved: Option<Tag>,
}

impl Receiver {
    /// Creates an empty receiver.
    pub fn new(mode: ReceiverMode) -> Self {
        Self {
            buffer: VecDeque::new(),
            mode,
            last_retrieved: None,
        }
    }

    /// Returns the out-of-order policy of this receiver.
    pub fn mode(&self) -> ReceiverMode {
        self.mode
    }

    /// Stores a token after all tokens with the same or an earlier tag.
    ///
    /// In strict mode, an error is returned and the token dropped if a token
    /// with a later tag was already retrieved.
    pub fn put(&mut self, token: Token, tag: Tag) -> Result<(), ReceiverError> {
        if let Some(last) = self.last_retrieved {
            if tag < last {
                match self.mode {
                    ReceiverMode::Strict => {
                        return Err(ReceiverError::OutOfOrder { tag, last });
                    }
                    ReceiverMode::Lenient => {
                        warn!(%tag, %last, "token received out of order");
                    }
                }
            }
        }

        let idx = self.buffer.partition_point(|(_, t)| *t <= tag);
        self.buffer.insert(idx, (token, tag));

        Ok(())
    }

    /// Removes and returns the oldest token if its tag is the current tag.
    pub fn get(&mut self, current: Tag) -> Result<Token, NoTokenAvailable> {
        match self.buffer.front() {
            Some((_, tag)) if *tag == current => {
                self.last_retrieved = Some(current);
                // The front element was just checked.
                self.buffer
                    .pop_front()
                    .map(|(token, _)| token)
                    .ok_or(NoTokenAvailable {
                        current,
                        front: None,
                    })
            }
            front => Err(NoTokenAvailable {
                current,
                front: front.map(|(_, tag)| *tag),
            }),
        }
    }

    /// Checks whether [`get`](Self::get) would succeed at the current tag.
    pub fn has_token(&self, current: Tag) -> bool {
        matches!(self.buffer.front(), Some((_, tag)) if *tag == current)
    }

    /// Returns the tag of the oldest token, if any.
    pub fn front_tag(&self) -> Option<Tag> {
        self.buffer.front().map(|(_, tag)| *tag)
    }

    /// Returns a restartable iterator over the buffered tokens and their
    /// tags, oldest first, without consuming them.
    pub fn elements(&self) -> Elements<'_> {
        Elements {
            inner: self.buffer.iter(),
        }
    }

    /// Drops all tokens with a tag earlier than the specified tag and
    /// returns how many were dropped.
    pub fn discard_before(&mut self, tag: Tag) -> usize {
        let count = self.buffer.partition_point(|(_, t)| *t < tag);
        self.buffer.drain(..count);

        count
    }

    /// Returns the number of buffered tokens.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Checks whether the receiver is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drops all tokens and forgets the last retrieved tag.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_retrieved = None;
    }
}

/// Iterator over the contents of a [`Receiver`].
///
/// This iterator is cheaply cloneable, which makes it possible to traverse
/// the snapshot several times.
#[derive(Clone, Debug)]
pub struct Elements<'a> {
    inner: vec_deque::Iter<'a, (Token, Tag)>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = (&'a Token, Tag);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(token, tag)| (token, *tag))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Elements<'_> {}

/// Error returned when no token is available at the current tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NoTokenAvailable {
    /// Tag at which a token was requested.
    pub current: Tag,
    /// Tag of the oldest buffered token, if any.
    pub front: Option<Tag>,
}

impl fmt::Display for NoTokenAvailable {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.front {
            Some(front) => write!(
                fmt,
                "no token available at tag {}, the oldest token has tag {}",
                self.current, front
            ),
            None => write!(fmt, "no token available at tag {}", self.current),
        }
    }
}

impl Error for NoTokenAvailable {}

/// Error returned when a strict receiver rejects a token.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReceiverError {
    /// The token has a tag earlier than a token already retrieved.
    OutOfOrder {
        /// Tag of the rejected token.
        tag: Tag,
        /// Tag of the last retrieved token.
        last: Tag,
    },
}

impl fmt::Display for ReceiverError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder { tag, last } => write!(
                fmt,
                "token with tag {} received after a token with tag {} was consumed",
                tag, last
            ),
        }
    }
}

impl Error for ReceiverError {}

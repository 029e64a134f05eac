//! Type-erased event payloads.
//!
//! The kernel never inspects token values: it only moves them between
//! queues, receivers and platform boundaries. A [`Token`] wraps any cloneable
//! value so that it can be copied when handed off across platforms.

use std::any::Any;
use std::fmt;

use dyn_clone::DynClone;

/// A value that can be carried by a [`Token`].
///
/// This trait is implemented automatically for all `Clone + Debug + Send`
/// types.
pub trait Payload: Any + DynClone + fmt::Debug + Send {
    /// Returns the payload as a `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed payload into a `Box<dyn Any>` for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

dyn_clone::clone_trait_object!(Payload);

impl<T: Any + Clone + fmt::Debug + Send> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An opaque event payload with copy semantics.
#[derive(Clone)]
pub struct Token(Box<dyn Payload>);

impl Token {
    /// Wraps a value.
    pub fn new<T: Payload>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Returns a reference to the value if it has the specified type.
    pub fn downcast_ref<T: Payload>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref()
    }

    /// Returns the value if it has the specified type, or the token itself
    /// otherwise.
    pub fn downcast<T: Payload>(self) -> Result<T, Self> {
        if (*self.0).as_any().is::<T>() {
            // The type was checked above.
            match self.0.into_any().downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(_) => unreachable!(),
            }
        } else {
            Err(self)
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.0).finish()
    }
}

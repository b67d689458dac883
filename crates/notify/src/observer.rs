//! Observer interface and the registration record handed to the registry.

use crate::flags::ChangedFlags;
use crate::sync::Arc;

/// Receives state-change notifications.
///
/// `instance` is the engine the notification originated from and `user_data`
/// is the value stored alongside the observer at registration, passed through
/// unmodified.
pub trait StateObserver<I: ?Sized, U>: Send + Sync {
    fn state_changed(&self, flags: ChangedFlags, instance: &I, user_data: &U);
}

impl<I: ?Sized, U, F> StateObserver<I, U> for F
where
    F: Fn(ChangedFlags, &I, &U) + Send + Sync,
{
    fn state_changed(&self, flags: ChangedFlags, instance: &I, user_data: &U) {
        self(flags, instance, user_data)
    }
}

pub type ObserverRef<I, U> = Arc<dyn StateObserver<I, U>>;

/// Registration record consumed by
/// [`CallbackRegistry::register`](crate::CallbackRegistry::register).
///
/// A record without an observer can be built through the builder; the
/// registry rejects it.
pub struct StateChangedCallback<I: ?Sized, U = ()> {
    pub(crate) observer: Option<ObserverRef<I, U>>,
    pub(crate) user_data: U,
}

impl<I: ?Sized, U> StateChangedCallback<I, U> {
    pub fn new<O>(observer: O, user_data: U) -> Self
    where
        O: StateObserver<I, U> + 'static,
    {
        Self {
            observer: Some(Arc::new(observer)),
            user_data,
        }
    }

    /// Same as [`new`](Self::new), but lets closure parameter types be
    /// inferred.
    pub fn from_fn<F>(callback: F, user_data: U) -> Self
    where
        F: Fn(ChangedFlags, &I, &U) + Send + Sync + 'static,
    {
        Self::new(callback, user_data)
    }

    /// Wraps an observer that is already shared elsewhere.
    pub fn from_shared(observer: ObserverRef<I, U>, user_data: U) -> Self {
        Self {
            observer: Some(observer),
            user_data,
        }
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    pub fn user_data(&self) -> &U {
        &self.user_data
    }
}

impl<I: ?Sized, U: Default> StateChangedCallback<I, U> {
    pub fn builder() -> StateChangedCallbackBuilder<I, U> {
        StateChangedCallbackBuilder {
            observer: None,
            user_data: U::default(),
        }
    }
}

/// Builder for [`StateChangedCallback`].
pub struct StateChangedCallbackBuilder<I: ?Sized, U> {
    observer: Option<ObserverRef<I, U>>,
    user_data: U,
}

impl<I: ?Sized, U> StateChangedCallbackBuilder<I, U> {
    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: StateObserver<I, U> + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn callback<F>(self, callback: F) -> Self
    where
        F: Fn(ChangedFlags, &I, &U) + Send + Sync + 'static,
    {
        self.observer(callback)
    }

    pub fn shared_observer(mut self, observer: ObserverRef<I, U>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn user_data(mut self, user_data: U) -> Self {
        self.user_data = user_data;
        self
    }

    pub fn build(self) -> StateChangedCallback<I, U> {
        StateChangedCallback {
            observer: self.observer,
            user_data: self.user_data,
        }
    }
}

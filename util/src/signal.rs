//! Synchronous observer lists.
//!
//! A [`Signal`] is owned by whatever raises the event. Handlers receive the context the signal
//! lives in explicitly, so they never need to recover it from the listener itself. Subscribing
//! returns a [`Subscription`] token that must be handed back through [`Signal::unsubscribe`]
//! before the subscriber's storage goes away. Dropping a token while its signal is still alive is
//! reported as an error (and asserts in debug builds).
use std::{
    fmt,
    rc::{Rc, Weak},
    thread,
};

use log::error;

type Handler<C, E> = Rc<dyn Fn(&mut C, &E)>;

pub struct Signal<C, E> {
    /// Only used for its address: tokens hold a weak reference to it to find out which signal
    /// they belong to and whether that signal still exists.
    identity: Rc<()>,
    next_id: u64,
    slots: Vec<Slot<C, E>>,
}

struct Slot<C, E> {
    id: u64,
    handler: Handler<C, E>,
}

impl<C, E> Default for Signal<C, E> {
    fn default() -> Self {
        Self {
            identity: Rc::new(()),
            next_id: 0,
            slots: Vec::new(),
        }
    }
}

impl<C, E> fmt::Debug for Signal<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.slots.len())
            .finish()
    }
}

impl<C, E> Signal<C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler. Handlers run in subscription order.
    pub fn subscribe(&mut self, handler: impl Fn(&mut C, &E) + 'static) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push(Slot {
            id,
            handler: Rc::new(handler),
        });
        Subscription {
            id,
            source: Rc::downgrade(&self.identity),
            retired: false,
        }
    }

    /// Detach the handler the token was issued for.
    ///
    /// Returns `false` if the token belongs to a different signal. The token is consumed either
    /// way.
    pub fn unsubscribe(&mut self, mut subscription: Subscription) -> bool {
        subscription.retired = true;
        if !subscription.belongs_to(self) {
            error!(
                "Subscription {} does not belong to this signal, ignoring unsubscribe",
                subscription.id
            );
            return false;
        }
        self.slots.retain(|slot| slot.id != subscription.id);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn is_subscribed(&self, id: u64) -> bool {
        self.slots.iter().any(|slot| slot.id == id)
    }
}

/// Raise an event: run every handler currently subscribed to the signal `select` resolves in
/// `context`.
///
/// The signal is looked up again before each handler runs. A handler that was unsubscribed by an
/// earlier handler of the same emission does not run, and nothing runs once the signal itself is
/// gone. Handlers subscribed during the emission run on the next one.
///
/// Returns the number of handlers invoked.
pub fn emit<C, E>(
    context: &mut C,
    select: impl Fn(&C) -> Option<&Signal<C, E>>,
    event: &E,
) -> usize {
    let Some(signal) = select(context) else {
        return 0;
    };

    let snapshot: Vec<(u64, Handler<C, E>)> = signal
        .slots
        .iter()
        .map(|slot| (slot.id, slot.handler.clone()))
        .collect();

    let mut invoked = 0;
    for (id, handler) in snapshot {
        let still_subscribed = select(context).is_some_and(|signal| signal.is_subscribed(id));
        if !still_subscribed {
            continue;
        }
        handler(context, event);
        invoked += 1;
    }
    invoked
}

/// A "must unsubscribe" token for one handler attached to one [`Signal`].
#[must_use = "subscriptions must be handed back via `Signal::unsubscribe`"]
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    source: Weak<()>,
    retired: bool,
}

impl Subscription {
    pub fn belongs_to<C, E>(&self, signal: &Signal<C, E>) -> bool {
        Weak::ptr_eq(&self.source, &Rc::downgrade(&signal.identity))
    }

    /// `false` once the signal that issued this token was dropped.
    pub fn is_source_alive(&self) -> bool {
        self.source.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.retired || !self.is_source_alive() {
            return;
        }
        error!(
            "Subscription {} dropped while its signal is still alive, the handler stays attached",
            self.id
        );
        debug_assert!(
            thread::panicking(),
            "Subscription dropped without unsubscribing"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Context {
        signal: Signal<Context, u32>,
        log: Vec<String>,
        tokens: Vec<Subscription>,
    }

    fn emit_on(context: &mut Context, event: u32) -> usize {
        emit(context, |c| Some(&c.signal), &event)
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut context = Context::default();
        for name in ["first", "second", "third"] {
            let token = context
                .signal
                .subscribe(move |c: &mut Context, e: &u32| c.log.push(format!("{name}:{e}")));
            context.tokens.push(token);
        }

        assert_eq!(emit_on(&mut context, 7), 3);
        assert_eq!(context.log, ["first:7", "second:7", "third:7"]);

        for token in context.tokens.drain(..) {
            assert!(context.signal.unsubscribe(token));
        }
        assert!(context.signal.is_empty());
    }

    #[test]
    fn unsubscribed_handlers_no_longer_run() {
        let mut context = Context::default();
        let token = context
            .signal
            .subscribe(|c: &mut Context, _: &u32| c.log.push("fired".into()));

        emit_on(&mut context, 1);
        assert!(context.signal.unsubscribe(token));
        assert_eq!(emit_on(&mut context, 2), 0);
        assert_eq!(context.log, ["fired"]);
    }

    #[test]
    fn handler_retired_during_emission_does_not_run() {
        let mut context = Context::default();
        // The first handler retires every other subscription, like a destroy handler does.
        let first = context.signal.subscribe(|c: &mut Context, _: &u32| {
            c.log.push("destroy".into());
            let tokens: Vec<_> = c.tokens.drain(..).collect();
            for token in tokens {
                c.signal.unsubscribe(token);
            }
        });
        let second = context
            .signal
            .subscribe(|c: &mut Context, _: &u32| c.log.push("late".into()));
        context.tokens.push(second);

        assert_eq!(emit_on(&mut context, 0), 1);
        assert_eq!(context.log, ["destroy"]);
        assert!(context.signal.unsubscribe(first));
    }

    #[test]
    fn handler_subscribed_during_emission_runs_next_time() {
        let mut context = Context::default();
        let token = context.signal.subscribe(|c: &mut Context, _: &u32| {
            if c.tokens.is_empty() {
                let late = c
                    .signal
                    .subscribe(|c: &mut Context, _: &u32| c.log.push("late".into()));
                c.tokens.push(late);
            }
        });

        assert_eq!(emit_on(&mut context, 0), 1);
        assert!(context.log.is_empty());
        assert_eq!(emit_on(&mut context, 0), 2);
        assert_eq!(context.log, ["late"]);

        let late = context.tokens.pop().unwrap();
        assert!(context.signal.unsubscribe(late));
        assert!(context.signal.unsubscribe(token));
    }

    #[test]
    fn foreign_token_is_rejected() {
        let mut a: Signal<(), ()> = Signal::new();
        let mut b: Signal<(), ()> = Signal::new();
        let token = a.subscribe(|_, _| {});

        assert!(!token.belongs_to(&b));
        assert!(!b.unsubscribe(token));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn token_outliving_its_signal_is_harmless() {
        let mut signal: Signal<(), ()> = Signal::new();
        let token = signal.subscribe(|_, _| {});
        drop(signal);
        assert!(!token.is_source_alive());
        drop(token);
    }

    #[test]
    fn emitting_a_missing_signal_runs_nothing() {
        let mut context = Context::default();
        assert_eq!(emit(&mut context, |_| None, &0), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "Subscription dropped without unsubscribing")]
    fn dropping_a_live_token_asserts() {
        let mut signal: Signal<(), ()> = Signal::new();
        let token = signal.subscribe(|_, _| {});
        drop(token);
    }
}

// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{ResolveError, Result};

type Thunk<T> = Box<dyn Fn() -> Result<Vec<T>>>;

enum State<T> {
    /// Defined but never pulled; holds the producer.
    Dormant(Thunk<T>),
    /// A pull is in flight. Observing this state from `force` means the
    /// producer transitively pulled its own sequence.
    Materializing,
    /// Materialized; replayed to every later consumer.
    Ready(Rc<[T]>),
}

/// A named, single-producer, memoized sequence.
///
/// The producer thunk runs at most once to completion: the first `force`
/// stores every yielded element and later forces replay the stored buffer.
/// The resolver is single-threaded (consumers drive derivations with
/// depth-first pulls), so memoization uses plain interior mutability.
///
/// A thunk that fails leaves the derivation dormant so the pull can be
/// retried, mirroring `OnceCell::get_or_try_init`.
pub struct Derivation<T> {
    name: String,
    state: RefCell<State<T>>,
}

impl<T: Clone> Derivation<T> {
    pub fn new(
        name: impl Into<String>,
        thunk: impl Fn() -> Result<Vec<T>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            state: RefCell::new(State::Dormant(Box::new(thunk))),
        }
    }

    /// The name is debug metadata only; it never affects results.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Materializes the sequence if needed and returns the shared buffer.
    ///
    /// Fails with [`ResolveError::CyclicDerivation`] when re-entered while
    /// its own producer is still running.
    pub fn force(&self) -> Result<Rc<[T]>> {
        let thunk = {
            let mut state = self.state.borrow_mut();
            match &*state {
                State::Ready(items) => return Ok(items.clone()),
                State::Materializing => {
                    return Err(ResolveError::CyclicDerivation(self.name.clone()))
                }
                State::Dormant(_) => match std::mem::replace(&mut *state, State::Materializing) {
                    State::Dormant(thunk) => thunk,
                    _ => unreachable!(),
                },
            }
        };

        // The producer runs without the state borrow held so that it can
        // freely force upstream derivations.
        match thunk() {
            Ok(items) => {
                let items: Rc<[T]> = items.into();
                *self.state.borrow_mut() = State::Ready(items.clone());
                Ok(items)
            }
            Err(err) => {
                *self.state.borrow_mut() = State::Dormant(thunk);
                Err(err)
            }
        }
    }
}

//! Per-thread attachment.
//!
//! The first [`Jvm::attach`] on a thread attaches it and records the
//! environment in a thread-local. When the thread exits the thread-local is
//! dropped, which detaches it again.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Env, JniEnv, Jvm};
use crate::error::{Error, Result};
use crate::logging::debug;

struct Attachment {
    jvm: Jvm,
    env: Rc<dyn JniEnv>,
}

impl Drop for Attachment {
    fn drop(&mut self) {
        debug!(vm = ?self.jvm.id(), "detaching thread");
        self.jvm.raw().detach_current_thread();
    }
}

thread_local! {
    static ATTACHED: RefCell<Vec<Attachment>> = const { RefCell::new(Vec::new()) };
}

pub(super) fn current(jvm: &Jvm) -> Result<Env> {
    ATTACHED
        .try_with(|attached| {
            let mut attached = attached
                .try_borrow_mut()
                .map_err(|_| Error::Attach("attachment table is busy".into()))?;
            if let Some(found) = attached.iter().find(|a| a.jvm.id() == jvm.id()) {
                return Ok(Env::new(found.env.clone(), jvm.clone()));
            }

            let env: Rc<dyn JniEnv> = Rc::from(jvm.raw().attach_current_thread(&jvm.attach_options())?);
            debug!(vm = ?jvm.id(), "attached thread");
            attached.push(Attachment {
                jvm: jvm.clone(),
                env: env.clone(),
            });
            Ok(Env::new(env, jvm.clone()))
        })
        .map_err(|_| Error::Attach("thread is shutting down".into()))?
}

/// True if the calling thread is attached to `jvm`.
pub fn is_attached(jvm: &Jvm) -> bool {
    ATTACHED
        .try_with(|attached| {
            attached
                .try_borrow()
                .map(|list| list.iter().any(|a| a.jvm.id() == jvm.id()))
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sim::SimVm;

    #[test]
    fn attaches_once_per_thread() {
        let sim = SimVm::new();
        let jvm = Jvm::new(sim.clone());
        assert!(!is_attached(&jvm));

        let first = jvm.attach().unwrap();
        let second = jvm.attach().unwrap();
        assert!(is_attached(&jvm));
        assert!(Rc::ptr_eq(&first.raw, &second.raw));
        assert_eq!(sim.attach_count(), 1);
    }

    #[test]
    fn detaches_when_thread_ends() {
        let sim = SimVm::new();
        let jvm = Jvm::new(sim.clone());

        let worker = jvm.clone();
        std::thread::spawn(move || {
            worker.attach().unwrap();
            assert!(is_attached(&worker));
        })
        .join()
        .unwrap();

        assert_eq!(sim.attach_count(), 1);
        assert_eq!(sim.detach_count(), 1);
        assert!(!is_attached(&jvm));
    }

    #[test]
    fn threads_attach_independently() {
        let sim = SimVm::new();
        let jvm = Jvm::new(sim.clone());
        jvm.attach().unwrap();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let jvm = jvm.clone();
                std::thread::spawn(move || {
                    jvm.attach().unwrap();
                    jvm.attach().unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sim.attach_count(), 4);
        assert_eq!(sim.detach_count(), 3);
    }
}

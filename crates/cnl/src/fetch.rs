//! Awaiting a node's object instead of watching its state.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use tokio::sync::oneshot;

use crate::error::{NamespaceError, Result};
use crate::namespace::Namespace;
use crate::object::Object;
use crate::state::{NamespaceState, ValidateState};

/// Request `namespace`'s object and resolve when it is ready.
///
/// Resolves with an error when the node or any descendant reaches a failure
/// state or fails validation. The network still has to be driven while the
/// future is pending; the future itself only waits.
///
/// ```rust,no_run
/// # async fn example(ns: cnl::Namespace) -> cnl::Result<()> {
/// let object = cnl::fetch_object(&ns)?.await?;
/// println!("{:?}", object);
/// # Ok(())
/// # }
/// ```
pub fn fetch_object(namespace: &Namespace) -> Result<impl Future<Output = Result<Object>>> {
    let (tx, rx) = oneshot::channel::<Result<Object>>();
    let sender = Rc::new(RefCell::new(Some(tx)));
    let callback_ids = Rc::new(RefCell::new(Vec::new()));

    let finish = {
        let weak = namespace.downgrade();
        let callback_ids = Rc::clone(&callback_ids);
        Rc::new(move |result: Result<Object>| {
            if let Some(tx) = sender.borrow_mut().take() {
                // The receiver may already be gone.
                let _ = tx.send(result);
            }
            if let Some(ns) = weak.upgrade() {
                let ids = std::mem::take(&mut *callback_ids.borrow_mut());
                for id in ids {
                    ns.remove_callback(id);
                }
            }
        })
    };

    let on_state = {
        let finish = Rc::clone(&finish);
        namespace.add_on_state_changed(move |ns, changed, state, _| {
            if changed == ns && state == NamespaceState::ObjectReady {
                if let Some(object) = changed.object() {
                    finish(Ok(object));
                }
            } else if state.is_failure() {
                finish(Err(NamespaceError::FetchFailed {
                    name: changed.name().clone(),
                    state,
                }));
            }
        })
    };
    let on_validate = {
        let finish = Rc::clone(&finish);
        namespace.add_on_validate_state_changed(move |_, changed, state, _| {
            if state == ValidateState::ValidateFailure {
                finish(Err(NamespaceError::ValidationFailed(changed.name().clone())));
            }
        })
    };
    callback_ids.borrow_mut().extend([on_state, on_validate]);

    if let Err(e) = namespace.object_needed(false) {
        namespace.remove_callback(on_state);
        namespace.remove_callback(on_validate);
        return Err(e);
    }

    Ok(async move { rx.await.unwrap_or(Err(NamespaceError::Cancelled)) })
}

//! Session identity: owns the opaque session token and creates a session at
//! most once no matter how many callers ask for one concurrently.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{Backend, SessionStartRequest};
use crate::errors::ClientError;
use crate::state::reconcile::short_id;
use crate::state::{Applied, Reconciler};

type CreateOutput = Result<bool, ClientError>;
type BoxedCreateFuture = Pin<Box<dyn Future<Output = CreateOutput> + Send + 'static>>;

#[derive(Clone)]
pub struct SessionIdentity {
    backend: Arc<dyn Backend>,
    reconciler: Reconciler,
    in_flight: Arc<Mutex<Option<Shared<BoxedCreateFuture>>>>,
}

impl SessionIdentity {
    pub fn new(backend: Arc<dyn Backend>, reconciler: Reconciler) -> Self {
        Self {
            backend,
            reconciler,
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Resolves to `true` when a usable session exists afterwards.
    ///
    /// Returns `false` without touching the network when there is no session
    /// and the draft carries no start signal. Concurrent callers share one
    /// creation attempt and all observe its result.
    pub async fn ensure_session(&self) -> Result<bool, ClientError> {
        let creation = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let state = self.reconciler.state();
                    if state.session_id().is_some() {
                        return Ok(true);
                    }
                    let draft = state.draft();
                    if !draft.has_start_signal() {
                        debug!("No session and no start signal; not creating one");
                        return Ok(false);
                    }
                    let request = SessionStartRequest {
                        language: draft.language,
                        intake: draft.intake(),
                    };
                    let creation = self.create(request).boxed().shared();
                    *slot = Some(creation.clone());
                    creation
                }
            }
        };
        creation.await
    }

    /// True while a creation call is outstanding.
    pub fn is_creating(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    fn create(&self, request: SessionStartRequest) -> impl Future<Output = CreateOutput> + Send + 'static {
        let backend = self.backend.clone();
        let reconciler = self.reconciler.clone();
        let slot = self.in_flight.clone();
        let seq = reconciler.state().issue_seq();

        async move {
            let outcome = match backend.create_session(&request).await {
                Ok(envelope) => {
                    let session_id = envelope.session_id.clone();
                    match reconciler.apply(seq, envelope, Some(&request.intake)) {
                        Applied::Applied => {
                            info!("Started session {}", short_id(&session_id));
                            Ok(true)
                        }
                        // cleared while the request was out; nothing refers to it now
                        Applied::Stale => {
                            debug!("Discarding session {} created after a clear", short_id(&session_id));
                            if let Err(e) = backend.delete_session(&session_id).await {
                                debug!("Orphaned session delete failed: {}", e);
                            }
                            Ok(false)
                        }
                    }
                }
                Err(e) => {
                    warn!("Session creation failed: {}", e);
                    Err(e)
                }
            };
            *slot.lock() = None;
            outcome
        }
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data-formatting panel host.
//
// A formatting panel owns in-memory state that must only be touched from the
// thread that created it. The panel is therefore built on, and only ever
// called from, one dedicated thread. Callers talk to it through a channel
// and wait for the reply; the rest of the engine never sees the thread.

use std::sync::Mutex;
use std::thread::JoinHandle;

use folio_core::DocumentData;
use folio_core::error::{FolioError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

/// Formats and validates a group's attribute tree before qualification.
///
/// An `Err` is a fault reported by the panel for this group only.
pub trait FormattingPanel {
    fn format(&mut self, data: DocumentData) -> std::result::Result<DocumentData, String>;
}

struct FormatRequest {
    data: DocumentData,
    reply: oneshot::Sender<std::result::Result<DocumentData, String>>,
}

/// Handle to a panel running on its own thread.
///
/// At most one formatting call is inside the panel at a time.
pub struct PanelHandle {
    requests: Option<mpsc::Sender<FormatRequest>>,
    in_flight: Mutex<()>,
    thread: Option<JoinHandle<()>>,
}

impl PanelHandle {
    /// Start a panel thread; `factory` runs on that thread to build the
    /// panel.
    pub fn spawn<F, P>(name: &str, factory: F) -> Result<Self>
    where
        F: FnOnce() -> P + Send + 'static,
        P: FormattingPanel + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<FormatRequest>(1);

        let thread = std::thread::Builder::new()
            .name(format!("panel-{name}"))
            .spawn(move || {
                let mut panel = factory();
                while let Some(request) = rx.blocking_recv() {
                    let result = panel.format(request.data);
                    if request.reply.send(result).is_err() {
                        warn!("formatting caller went away before the reply");
                    }
                }
                debug!("panel thread exiting");
            })?;

        Ok(Self {
            requests: Some(tx),
            in_flight: Mutex::new(()),
            thread: Some(thread),
        })
    }

    /// Format `data` on the panel thread and wait for the result.
    ///
    /// Must not be called from inside an async task; use a blocking
    /// context.
    #[instrument(skip_all, fields(nodes = data.attributes.len()))]
    pub fn format(&self, data: DocumentData) -> Result<DocumentData> {
        let _turn = self
            .in_flight
            .lock()
            .map_err(|_| FolioError::DataFormatting("panel mutex poisoned".into()))?;

        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| FolioError::DataFormatting("panel is shut down".into()))?;

        let (reply, response) = oneshot::channel();
        requests
            .blocking_send(FormatRequest { data, reply })
            .map_err(|_| FolioError::DataFormatting("panel thread has stopped".into()))?;

        response
            .blocking_recv()
            .map_err(|_| FolioError::DataFormatting("panel dropped the request".into()))?
            .map_err(FolioError::DataFormatting)
    }
}

impl Drop for PanelHandle {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("panel thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::AttributeNode;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Holds an `Rc`, so it can only live on the thread that built it.
    struct UppercasePanel {
        calls: Rc<std::cell::Cell<usize>>,
        thread: std::thread::ThreadId,
    }

    impl FormattingPanel for UppercasePanel {
        fn format(&mut self, data: DocumentData) -> std::result::Result<DocumentData, String> {
            assert_eq!(std::thread::current().id(), self.thread);
            self.calls.set(self.calls.get() + 1);
            let attributes = data
                .attributes
                .iter()
                .map(|a| {
                    if a.value() == "bad" {
                        return Err(format!("cannot format {}", a.name()));
                    }
                    Ok(AttributeNode::leaf(a.name(), a.value().to_uppercase()))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(DocumentData::new(attributes))
        }
    }

    fn panel() -> PanelHandle {
        PanelHandle::spawn("test", || UppercasePanel {
            calls: Rc::new(std::cell::Cell::new(0)),
            thread: std::thread::current().id(),
        })
        .unwrap()
    }

    #[test]
    fn formats_on_panel_thread() {
        let handle = panel();
        let out = handle
            .format(DocumentData::new(vec![AttributeNode::leaf("Vendor", "acme")]))
            .unwrap();
        assert_eq!(out.attributes[0].value(), "ACME");
    }

    #[test]
    fn panel_fault_is_data_formatting_error() {
        let handle = panel();
        let err = handle
            .format(DocumentData::new(vec![AttributeNode::leaf("Total", "bad")]))
            .unwrap_err();
        assert!(matches!(err, FolioError::DataFormatting(msg) if msg.contains("Total")));

        // Still serving after a fault.
        assert!(handle.format(DocumentData::default()).is_ok());
    }

    #[test]
    fn concurrent_callers_are_serialised() {
        struct Counting {
            active: Arc<AtomicUsize>,
            max_seen: Arc<AtomicUsize>,
        }

        impl FormattingPanel for Counting {
            fn format(&mut self, data: DocumentData) -> std::result::Result<DocumentData, String> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(data)
            }
        }

        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let handle = {
            let (active, max_seen) = (active.clone(), max_seen.clone());
            Arc::new(PanelHandle::spawn("count", move || Counting { active, max_seen }).unwrap())
        };

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        handle.format(DocumentData::default()).unwrap();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}

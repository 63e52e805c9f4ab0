//! Interceptor chain
//!
//! Runs a route's interceptors around its primary handler:
//!
//! 1. `Before` interceptors in attachment order. The first error is written
//!    to the client and ends the request; nothing else runs.
//! 2. The primary handler, once. An error is written to the client.
//! 3. The response is committed.
//! 4. `OnError` interceptors, only if the handler failed. Results ignored.
//! 5. `After` interceptors. Results ignored.

use std::sync::Arc;

use super::HandlerFunc;
use crate::error::Error;
use crate::http::{Request, ResponseWriter};
use crate::logger;

/// Point in the chain at which an interceptor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
    OnError,
}

#[derive(Clone)]
pub struct Interceptor {
    pub phase: Phase,
    pub handler: HandlerFunc,
}

/// How a dispatched request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A before interceptor rejected the request
    Rejected,
    /// The primary handler returned an error
    Failed,
    Completed,
}

/// Primary handler plus its interceptors in attachment order
#[derive(Clone)]
pub struct Chain {
    handler: HandlerFunc,
    interceptors: Vec<Interceptor>,
}

impl Chain {
    pub fn new(handler: HandlerFunc) -> Self {
        Self {
            handler,
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor; earlier attachments keep their position
    pub fn push(&mut self, phase: Phase, handler: HandlerFunc) {
        self.interceptors.push(Interceptor { phase, handler });
    }

    pub fn interceptors(&self) -> &[Interceptor] {
        &self.interceptors
    }

    fn phase(&self, phase: Phase) -> impl Iterator<Item = &HandlerFunc> {
        self.interceptors
            .iter()
            .filter(move |i| i.phase == phase)
            .map(|i| &i.handler)
    }

    pub fn dispatch(&self, w: &mut ResponseWriter, r: &mut Request) -> Outcome {
        for before in self.phase(Phase::Before) {
            if let Err(err) = before(w, r) {
                write_error(w, &err);
                w.commit();
                return Outcome::Rejected;
            }
        }

        let handled = (self.handler)(w, r);
        if let Err(err) = &handled {
            write_error(w, err);
        }
        w.commit();

        let outcome = if handled.is_err() {
            for on_error in self.phase(Phase::OnError) {
                let result = on_error(w, r);
                ignore(w, result, "on-error");
            }
            Outcome::Failed
        } else {
            Outcome::Completed
        };

        for after in self.phase(Phase::After) {
            let result = after(w, r);
            ignore(w, result, "after");
        }

        outcome
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("handler", &Arc::as_ptr(&self.handler))
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.phase).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Write `err`, falling back to a bare status line if it cannot be encoded
pub(crate) fn write_error(w: &mut ResponseWriter, err: &Error) {
    if let Err(e) = w.write_error(err) {
        logger::log_error(&format!("Failed to write error response: {e}"));
        if let Err(e) = w.set_status(err.status) {
            logger::log_error(&format!("Failed to set error status: {e}"));
        }
    }
}

fn ignore(w: &ResponseWriter, result: Result<(), Error>, phase: &str) {
    if let Err(err) = result {
        if w.config().debug {
            logger::log_debug(&format!("Ignored {phase} interceptor error: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseConfig;
    use crate::error::HandlerResult;
    use hyper::body::Bytes;
    use hyper::StatusCode;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &str, fail: bool) -> HandlerFunc {
        let log = Arc::clone(log);
        let name = name.to_string();
        crate::handler::handler_fn(move |_w, _r| {
            log.lock().unwrap().push(name.clone());
            if fail {
                Err(Error::new(format!("{name} failed"), StatusCode::IM_A_TEAPOT))
            } else {
                Ok(())
            }
        })
    }

    fn run(chain: &Chain) -> (Outcome, ResponseWriter) {
        let mut w = ResponseWriter::new(ResponseConfig::default());
        let mut r = Request::from_http(hyper::Request::new(Bytes::new()));
        let outcome = chain.dispatch(&mut w, &mut r);
        (outcome, w)
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_no_interceptors_runs_handler_once() {
        let log = Log::default();
        let chain = Chain::new(recorder(&log, "handler", false));
        let (outcome, w) = run(&chain);
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(entries(&log), vec!["handler"]);
        assert_eq!(w.status(), StatusCode::OK);
        assert!(w.is_committed());
    }

    #[test]
    fn test_no_interceptors_handler_error_is_written() {
        let log = Log::default();
        let chain = Chain::new(recorder(&log, "handler", true));
        let (outcome, w) = run(&chain);
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(w.status(), StatusCode::IM_A_TEAPOT);
        assert!(std::str::from_utf8(w.body()).unwrap().contains("handler failed"));
    }

    #[test]
    fn test_kth_before_failure_stops_everything() {
        let log = Log::default();
        let mut chain = Chain::new(recorder(&log, "handler", false));
        chain.push(Phase::Before, recorder(&log, "before1", false));
        chain.push(Phase::After, recorder(&log, "after", false));
        chain.push(Phase::Before, recorder(&log, "before2", true));
        chain.push(Phase::OnError, recorder(&log, "on_error", false));
        chain.push(Phase::Before, recorder(&log, "before3", false));

        let (outcome, w) = run(&chain);
        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(entries(&log), vec!["before1", "before2"]);
        assert_eq!(w.status(), StatusCode::IM_A_TEAPOT);
        assert!(std::str::from_utf8(w.body()).unwrap().contains("before2 failed"));
    }

    #[test]
    fn test_handler_error_runs_on_error_then_after_in_order() {
        let log = Log::default();
        let mut chain = Chain::new(recorder(&log, "handler", true));
        chain.push(Phase::After, recorder(&log, "after1", true));
        chain.push(Phase::OnError, recorder(&log, "on_error1", true));
        chain.push(Phase::Before, recorder(&log, "before", false));
        chain.push(Phase::OnError, recorder(&log, "on_error2", false));
        chain.push(Phase::After, recorder(&log, "after2", false));

        let (outcome, w) = run(&chain);
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            entries(&log),
            vec!["before", "handler", "on_error1", "on_error2", "after1", "after2"]
        );
        // the interceptor errors do not replace the handler's error
        assert!(std::str::from_utf8(w.body()).unwrap().contains("handler failed"));
    }

    #[test]
    fn test_success_skips_on_error() {
        let log = Log::default();
        let mut chain = Chain::new(recorder(&log, "handler", false));
        chain.push(Phase::OnError, recorder(&log, "on_error", false));
        chain.push(Phase::After, recorder(&log, "after", false));

        let (outcome, _) = run(&chain);
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(entries(&log), vec!["handler", "after"]);
    }

    #[test]
    fn test_late_interceptors_cannot_alter_response() {
        let chain = {
            let mut chain = Chain::new(Arc::new(|w: &mut ResponseWriter, _r: &mut Request| -> HandlerResult {
                w.write(b"body")?;
                Err(Error::not_found("X"))
            }));
            let tamper: HandlerFunc = Arc::new(|w: &mut ResponseWriter, _r: &mut Request| -> HandlerResult {
                w.write(b"tampered")?;
                w.set_status(StatusCode::OK)?;
                Ok(())
            });
            chain.push(Phase::OnError, Arc::clone(&tamper));
            chain.push(Phase::After, tamper);
            chain
        };

        let (_, w) = run(&chain);
        assert_eq!(w.status(), StatusCode::NOT_FOUND);
        assert_eq!(w.body(), br#"{"error":"X","httpCode":404}"#);
    }

    #[test]
    fn test_write_error_after_commit_leaves_response() {
        let mut w = ResponseWriter::new(ResponseConfig::default());
        w.write(b"done").unwrap();
        w.commit();

        write_error(&mut w, &Error::internal("late"));
        assert_eq!(w.status(), StatusCode::OK);
        assert_eq!(w.body(), b"done");
    }
}

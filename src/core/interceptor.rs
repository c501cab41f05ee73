//! Pre-render interceptor chain
//!
//! Interceptors see every entry a route is about to render, after channel
//! filtering and on the route's own clone. An interceptor may:
//!
//! - return `Some(output)` to replace the route's rendering of the entry,
//! - set `meta.output = false` to suppress the entry,
//! - mutate args / meta and return `None` to fall through.

use super::log_entry::LogEntry;
use std::fmt;

pub trait Interceptor: Send + Sync {
    /// `route` is the name of the route doing the rendering
    fn intercept(&self, route: &str, entry: &mut LogEntry) -> Option<String>;
}

/// Adapts a closure into an [`Interceptor`]
///
/// # Example
///
/// ```
/// use debug_console::{FnInterceptor, Interceptor, LogEntry, Method};
///
/// let shout = FnInterceptor::new(|_route: &str, entry: &mut LogEntry| {
///     (entry.method == Method::Custom("shout".into()))
///         .then(|| entry.first_arg_text().to_uppercase())
/// });
///
/// let mut entry = LogEntry::new("general", "shout", vec!["hi".into()]);
/// assert_eq!(shout.intercept("text", &mut entry).as_deref(), Some("HI"));
/// ```
pub struct FnInterceptor<F>(F);

impl<F> FnInterceptor<F>
where
    F: Fn(&str, &mut LogEntry) -> Option<String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&str, &mut LogEntry) -> Option<String> + Send + Sync,
{
    fn intercept(&self, route: &str, entry: &mut LogEntry) -> Option<String> {
        (self.0)(route, entry)
    }
}

#[derive(Default)]
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Box<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run in registration order; the first `Some` wins
    ///
    /// An interceptor that suppresses the entry stops the chain as well.
    pub fn run(&self, route: &str, entry: &mut LogEntry) -> Option<String> {
        for interceptor in &self.interceptors {
            if let Some(output) = interceptor.intercept(route, entry) {
                return Some(output);
            }
            if !entry.meta.output() {
                break;
            }
        }
        None
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Method, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entry() -> LogEntry {
        LogEntry::new("general", Method::Log, vec![Value::from("hello")])
    }

    #[test]
    fn test_first_some_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut chain = InterceptorChain::new();
        chain.push(Box::new(FnInterceptor::new(|_: &str, e: &mut LogEntry| {
            e.args.push(Value::from("extra"));
            None
        })));
        chain.push(Box::new(FnInterceptor::new(|route: &str, _: &mut LogEntry| {
            Some(format!("[{}]", route))
        })));
        let counter = Arc::clone(&calls);
        chain.push(Box::new(FnInterceptor::new(move |_: &str, _: &mut LogEntry| {
            counter.fetch_add(1, Ordering::SeqCst);
            None
        })));

        let mut e = entry();
        assert_eq!(chain.run("html", &mut e).as_deref(), Some("[html]"));
        assert_eq!(e.args.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_suppression_stops_chain() {
        let mut chain = InterceptorChain::new();
        chain.push(Box::new(FnInterceptor::new(|_: &str, e: &mut LogEntry| {
            e.meta.set_output(false);
            None
        })));
        chain.push(Box::new(FnInterceptor::new(|_: &str, _: &mut LogEntry| {
            Some("never".to_string())
        })));

        let mut e = entry();
        assert!(chain.run("script", &mut e).is_none());
        assert!(!e.meta.output());
    }
}

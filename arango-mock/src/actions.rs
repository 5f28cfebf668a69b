use std::time::Duration;

use axum::http::Method;
use serde_json::Value;

use crate::RecordedRequest;

/// Specifies when an associated [`Reaction`] will be performed.
/// Conditions are subject to logic, with `not()`, `and()` and `or()`
/// convenience functions.
#[derive(Debug, Clone)]
pub enum Condition {
    True,

    False,

    Not(Box<Condition>),

    And(Box<Condition>, Box<Condition>),

    Or(Box<Condition>, Box<Condition>),

    /// True iff the request has the given HTTP method.
    Method(Method),

    /// True iff the request path, including the `/_db/{name}` prefix, is equal to the given one.
    PathEquals(String),

    /// True iff the request path contains the given string.
    PathContains(String),

    /// True iff the request carries the given header (name is case-insensitive).
    HeaderPresent(String),

    /// True iff the request carries the given header with the given value.
    HeaderEquals(String, String),

    /// True iff the request body contains the given byte slice.
    BodyContains(Box<[u8]>),

    /// True iff this is the n-th request received by the server, counting from 0.
    RequestSeqNo(usize),
}

/// The context in which [`Conditions`](Condition) are evaluated.
pub(crate) struct EvaluationContext<'a> {
    pub(crate) seq_no: usize,
    pub(crate) request: &'a RecordedRequest,
}

impl Condition {
    pub(crate) fn eval(&self, ctx: &EvaluationContext<'_>) -> bool {
        match self {
            Condition::True => true,

            Condition::False => false,

            Condition::Not(c) => !c.eval(ctx),

            Condition::And(c1, c2) => c1.eval(ctx) && c2.eval(ctx),

            Condition::Or(c1, c2) => c1.eval(ctx) || c2.eval(ctx),

            Condition::Method(method) => *method == ctx.request.method,

            Condition::PathEquals(path) => *path == ctx.request.path,

            Condition::PathContains(part) => ctx.request.path.contains(part.as_str()),

            Condition::HeaderPresent(name) => ctx.request.header(name).is_some(),

            Condition::HeaderEquals(name, value) => ctx.request.header(name) == Some(value.as_str()),

            Condition::BodyContains(pattern) => ctx
                .request
                .body
                .windows(pattern.len())
                .any(|window| *window == **pattern),

            Condition::RequestSeqNo(no) => *no == ctx.seq_no,
        }
    }

    /// A convenience function for creating [Condition::Not] variant.
    #[allow(clippy::should_implement_trait)]
    pub fn not(c: Self) -> Self {
        Condition::Not(Box::new(c))
    }

    /// A convenience function for creating [Condition::And] variant.
    pub fn and(self, c2: Self) -> Self {
        Self::And(Box::new(self), Box::new(c2))
    }

    /// A convenience function for creating [Condition::Or] variant.
    pub fn or(self, c2: Self) -> Self {
        Self::Or(Box::new(self), Box::new(c2))
    }
}

/// Describes what to do with a matching request: wait, and then either
/// answer on behalf of the server or let the server handle it.
#[derive(Debug, Clone, Default)]
pub struct Reaction {
    pub delay: Option<Duration>,
    /// Status and JSON body returned instead of the server's answer.
    pub respond_with: Option<(u16, Value)>,
    /// Extra headers added to `respond_with`.
    pub headers: Vec<(String, String)>,
}

impl Reaction {
    /// Answer with the given status and body.
    pub fn respond(status: u16, body: Value) -> Self {
        Reaction {
            respond_with: Some((status, body)),
            ..Default::default()
        }
    }

    /// Answer with an ArangoDB error envelope.
    pub fn error(status: u16, error_num: i64, message: &str) -> Self {
        Self::respond(
            status,
            serde_json::json!({
                "error": true,
                "code": status,
                "errorNum": error_num,
                "errorMessage": message,
            }),
        )
    }

    /// Pass the request to the server after the given delay.
    pub fn delay(delay: Duration) -> Self {
        Reaction {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A rule describing what the server should do with a received request
/// and on what conditions. The first matching rule wins.
#[derive(Debug, Clone)]
pub struct RequestRule(pub Condition, pub Reaction);

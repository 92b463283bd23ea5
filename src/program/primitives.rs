//! Names of the engine primitives the compiler emits calls to.

pub const HTTP_GET: &str = "http.get";
pub const HTTP_POST: &str = "http.post";
pub const HTTP_DELETE: &str = "http.delete";
pub const HTTP_REQUEST: &str = "http.request";
pub const SLEEP: &str = "sys.sleep";
pub const LOG: &str = "sys.log";
pub const GET_ENV: &str = "sys.get_env";
pub const AWAIT_CALLBACK: &str = "events.await_callback";

/// Jump targets the engine defines itself.
pub const RESERVED_JUMPS: [&str; 3] = ["break", "continue", "end"];

/// Primitives are namespaced (`http.post`); generated routine names never contain a dot.
pub fn is_primitive(target: &str) -> bool {
    target.contains('.')
}
